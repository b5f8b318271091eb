//! Feature-specific logging macros
//!
//! Each macro logs under the target of one subsystem so that its verbosity
//! can be tuned through `LogConfig::features`.

/// Feature categories for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFeature {
    Crm,
    Store,
    Intake,
    Notify,
}

impl LogFeature {
    /// Get the target string for this feature
    pub fn target(&self) -> &'static str {
        match self {
            LogFeature::Crm => "referral_intake::crm",
            LogFeature::Store => "referral_intake::store",
            LogFeature::Intake => "referral_intake::intake",
            LogFeature::Notify => "referral_intake::notify",
        }
    }

    /// Key used for this feature in `LogConfig::features`.
    pub fn config_key(&self) -> &'static str {
        match self {
            LogFeature::Crm => "crm",
            LogFeature::Store => "store",
            LogFeature::Intake => "intake",
            LogFeature::Notify => "notify",
        }
    }
}

// CRM logging macros
#[macro_export]
macro_rules! log_crm_debug {
    ($($arg:tt)*) => {
        log::debug!(target: "referral_intake::crm", $($arg)*)
    };
}

#[macro_export]
macro_rules! log_crm_info {
    ($($arg:tt)*) => {
        log::info!(target: "referral_intake::crm", $($arg)*)
    };
}

#[macro_export]
macro_rules! log_crm_warn {
    ($($arg:tt)*) => {
        log::warn!(target: "referral_intake::crm", $($arg)*)
    };
}

// Intake logging macros
#[macro_export]
macro_rules! log_intake_debug {
    ($($arg:tt)*) => {
        log::debug!(target: "referral_intake::intake", $($arg)*)
    };
}

#[macro_export]
macro_rules! log_intake_info {
    ($($arg:tt)*) => {
        log::info!(target: "referral_intake::intake", $($arg)*)
    };
}

#[macro_export]
macro_rules! log_intake_warn {
    ($($arg:tt)*) => {
        log::warn!(target: "referral_intake::intake", $($arg)*)
    };
}

#[macro_export]
macro_rules! log_intake_error {
    ($($arg:tt)*) => {
        log::error!(target: "referral_intake::intake", $($arg)*)
    };
}

// Notification logging macros
#[macro_export]
macro_rules! log_notify_debug {
    ($($arg:tt)*) => {
        log::debug!(target: "referral_intake::notify", $($arg)*)
    };
}

#[macro_export]
macro_rules! log_notify_info {
    ($($arg:tt)*) => {
        log::info!(target: "referral_intake::notify", $($arg)*)
    };
}

#[macro_export]
macro_rules! log_notify_warn {
    ($($arg:tt)*) => {
        log::warn!(target: "referral_intake::notify", $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::TARGET_PREFIX;

    #[test]
    fn test_targets_share_prefix() {
        for feature in [
            LogFeature::Crm,
            LogFeature::Store,
            LogFeature::Intake,
            LogFeature::Notify,
        ] {
            assert_eq!(
                feature.target(),
                format!("{}::{}", TARGET_PREFIX, feature.config_key())
            );
        }
    }
}
