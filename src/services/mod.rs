// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod history;
pub mod identity;
pub mod measurement;
pub mod onboarding;

pub use history::{HistoryService, HistoryStatus};
pub use identity::{IdentityClient, IdentityCode, IdentityError};
pub use measurement::{MeasurementService, PairingKeys};
pub use onboarding::{OnboardingService, OnboardingStep};
