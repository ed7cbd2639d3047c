//! Integration tests for the generation queue.

mod helpers;

mod cache_test;
mod cancel_test;
mod dispatch_test;
mod health_test;
mod retry_test;
mod submit_test;
