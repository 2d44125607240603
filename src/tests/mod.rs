//! Scenario tests spanning several modules.

mod prediction_tests;
