//! Destination key to branding and house-manager lookup.

use std::collections::HashMap;

use crate::config::{DestinationEntry, HouseManagerContact, NotificationConfig};

/// Branding resolved for one referral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branding {
    pub organization_name: String,
    pub house_manager: Option<HouseManagerContact>,
}

/// Pure lookup table. Unknown or missing destinations resolve to the default
/// organization without a house manager.
#[derive(Debug, Clone, Default)]
pub struct DestinationDirectory {
    default_organization: String,
    entries: HashMap<String, DestinationEntry>,
}

impl DestinationDirectory {
    pub fn new(
        default_organization: impl Into<String>,
        entries: HashMap<String, DestinationEntry>,
    ) -> Self {
        Self {
            default_organization: default_organization.into(),
            entries,
        }
    }

    pub fn from_config(config: &NotificationConfig) -> Self {
        Self::new(
            config.default_organization.clone(),
            config.destinations.clone(),
        )
    }

    pub fn resolve(&self, destination: Option<&str>) -> Branding {
        let entry = destination
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .and_then(|key| self.entries.get(key));

        match entry {
            Some(entry) => Branding {
                organization_name: entry.organization_name.clone(),
                house_manager: entry.house_manager.clone(),
            },
            None => Branding {
                organization_name: self.default_organization.clone(),
                house_manager: None,
            },
        }
    }
}
