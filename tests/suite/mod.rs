//! Integration test suite modules

mod gateway;
mod orchestration;
