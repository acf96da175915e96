//! Raw quota report model and normalizer
//!
//! The carrier's report is deeply nested and inconsistently shaped: three
//! optional sections (shared pool / unshared resources / public-free
//! resources), numeric fields that arrive either as JSON numbers or as
//! strings, and shared line items that break usage down per device. The
//! normalizer flattens all of it into a uniform `Package` list.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ============================================================================
// Flexible field parsing
// ============================================================================

/// Accept a number, a numeric string, or null; anything else becomes 0.
fn flex_f64<'de, D: Deserializer<'de>>(de: D) -> Result<f64, D::Error> {
    let value = Option::<Value>::deserialize(de)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

/// Accept a string or a number; anything else becomes "".
fn flex_string<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    let value = Option::<Value>::deserialize(de)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

// ============================================================================
// Raw report shapes
// ============================================================================

/// The unparsed upstream quota report
///
/// Transient; consumed immediately by [`normalize`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawReport {
    /// Primary package name shown to the subscriber
    #[serde(rename = "mainPackageName", deserialize_with = "flex_string")]
    pub main_package_name: String,

    /// Shared-pool section (family/multi-device plans)
    #[serde(rename = "sharedResources")]
    pub shared: Option<ReportSection>,

    /// Unshared / general resources section
    #[serde(rename = "unsharedResources")]
    pub unshared: Option<ReportSection>,

    /// Public-free resources section (app-specific free traffic)
    #[serde(rename = "publicFreeResources")]
    pub public_free: Option<ReportSection>,
}

/// One section of the report
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReportSection {
    pub items: Vec<ReportItem>,
}

/// One quota line item as the carrier sends it
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReportItem {
    #[serde(deserialize_with = "flex_string")]
    pub tag: String,
    #[serde(deserialize_with = "flex_string")]
    pub name: String,
    #[serde(deserialize_with = "flex_string")]
    pub flow_type: String,
    #[serde(deserialize_with = "flex_string")]
    pub resource_type: String,
    #[serde(deserialize_with = "flex_f64")]
    pub total: f64,
    #[serde(deserialize_with = "flex_f64")]
    pub used: f64,
    #[serde(deserialize_with = "flex_f64")]
    pub remain: f64,
    #[serde(deserialize_with = "flex_string")]
    pub expire_date: String,
    /// Per-device usage breakdown (shared pools only)
    pub devices: Vec<DeviceUsage>,
}

/// Per-device usage entry inside a shared line item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceUsage {
    /// Device phone number, sometimes masked as `138****5678`
    #[serde(deserialize_with = "flex_string")]
    pub number: String,
    #[serde(deserialize_with = "flex_f64")]
    pub used: f64,
}

// ============================================================================
// Package
// ============================================================================

/// Resource type forced onto public-free items
pub const PUBLIC_FREE_RESOURCE_TYPE: &str = "13";

/// One normalized quota line item
///
/// Immutable once created; all amounts are non-negative and share the
/// carrier's unit (KB).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub tag: String,
    pub name: String,
    pub flow_type: String,
    pub resource_type: String,
    pub total: f64,
    pub used: f64,
    pub remain: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<DeviceUsage>,
    pub expire_date: String,
    pub is_public_free: bool,
}

// ============================================================================
// Normalizer
// ============================================================================

/// Flatten a raw report into an ordered list of packages
///
/// `account_number` is the subscriber's own phone number; for shared-pool
/// items the account's usage is the usage of the device entry matching it
/// (exact or masked compare), or 0 when no entry matches.
pub fn normalize(report: &RawReport, account_number: &str) -> Vec<Package> {
    let mut packages = Vec::new();

    if let Some(shared) = &report.shared {
        for item in &shared.items {
            if item.flow_type.is_empty() || item.resource_type.is_empty() {
                log::debug!(
                    "[monitor:report] skipping shared item {:?} without flow/resource type",
                    item.name
                );
                continue;
            }
            let used = own_device_usage(&item.devices, account_number);
            packages.push(Package {
                tag: item.tag.clone(),
                name: item.name.clone(),
                flow_type: item.flow_type.clone(),
                resource_type: item.resource_type.clone(),
                total: item.total,
                used,
                remain: item.remain,
                devices: item.devices.iter().map(|d| DeviceUsage {
                    number: d.number.clone(),
                    used: d.used,
                }).collect(),
                expire_date: item.expire_date.clone(),
                is_public_free: false,
            });
        }
    }

    // Unshared resources carry the account's usage directly on the item
    if let Some(unshared) = &report.unshared {
        for item in &unshared.items {
            if item.flow_type.is_empty() || item.resource_type.is_empty() {
                log::debug!(
                    "[monitor:report] skipping unshared item {:?} without flow/resource type",
                    item.name
                );
                continue;
            }
            packages.push(Package {
                tag: item.tag.clone(),
                name: item.name.clone(),
                flow_type: item.flow_type.clone(),
                resource_type: item.resource_type.clone(),
                total: item.total,
                used: item.used,
                remain: item.remain,
                devices: Vec::new(),
                expire_date: item.expire_date.clone(),
                is_public_free: false,
            });
        }
    }

    // Public-free items only need a flow type; totals are not meaningful
    // quotas upstream, so they are forced to zero regardless of what the
    // carrier sent.
    if let Some(public_free) = &report.public_free {
        for item in &public_free.items {
            if item.flow_type.is_empty() {
                log::debug!(
                    "[monitor:report] skipping public-free item {:?} without flow type",
                    item.name
                );
                continue;
            }
            packages.push(Package {
                tag: item.tag.clone(),
                name: item.name.clone(),
                flow_type: item.flow_type.clone(),
                resource_type: PUBLIC_FREE_RESOURCE_TYPE.to_string(),
                total: 0.0,
                used: item.used,
                remain: 0.0,
                devices: Vec::new(),
                expire_date: item.expire_date.clone(),
                is_public_free: true,
            });
        }
    }

    packages
}

/// Usage of the account's own device within a shared pool (0 if absent)
fn own_device_usage(devices: &[DeviceUsage], account_number: &str) -> f64 {
    devices
        .iter()
        .find(|d| device_matches(&d.number, account_number))
        .map(|d| d.used)
        .unwrap_or(0.0)
}

/// Match a device number against the account number
///
/// Exact compare, or the carrier's masked form `###****####` where the
/// first three and last four digits must match the account number.
pub(crate) fn device_matches(device: &str, account: &str) -> bool {
    if device == account {
        return true;
    }
    if device.len() == 11
        && account.len() == 11
        && device.is_ascii()
        && account.is_ascii()
        && &device[3..7] == "****"
    {
        return device[..3] == account[..3] && device[7..] == account[7..];
    }
    false
}

// ============================================================================
// Tests
// ============================================================================
