//! Integration test suite for hive.
//!
//! These tests drive the orchestrator end to end through scripted role
//! doubles and verify that planning, production, review, logging and
//! persistence work together.
//!
//! # Test Categories
//!
//! - `orchestrator_e2e`: Single-round scenarios and concurrency
//! - `replanning`: Multi-round behavior and round limits
//! - `logger_isolation`: Logger failures never change outcomes
//! - `timeouts`: Deadline handling for every role
//! - `persistence`: Snapshots, resume and the event journal
//! - `command_adapter`: External command roles
//!
//! # CI Compatibility
//!
//! No external services are contacted. The command adapter tests only
//! need a POSIX shell and are skipped on other platforms.


mod command_adapter;
mod logger_isolation;
mod persistence;
mod timeouts;
