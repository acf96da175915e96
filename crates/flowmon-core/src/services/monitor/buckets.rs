//! Bucket classification and aggregation
//!
//! Packages are summed into six base category buckets (common, regional
//! and targeted traffic, each split limited/unlimited). Three aggregate
//! buckets are derived from those: "all common" (common + regional),
//! "all targeted-free" and "all traffic".
//!
//! Invariant: an unlimited bucket (total == 0) never contributes its
//! `remain` to an aggregate. Its remain is not a meaningful quota, while
//! its `used` still rolls up.

use serde::{Deserialize, Serialize};

use super::report::Package;

// ============================================================================
// Bucket Key
// ============================================================================

/// The six base quota categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketKey {
    CommonLimited,
    CommonUnlimited,
    RegionalLimited,
    RegionalUnlimited,
    TargetedLimited,
    TargetedUnlimited,
}

impl BucketKey {
    /// All base buckets, in a fixed iteration order
    pub const BASE: [BucketKey; 6] = [
        BucketKey::CommonLimited,
        BucketKey::CommonUnlimited,
        BucketKey::RegionalLimited,
        BucketKey::RegionalUnlimited,
        BucketKey::TargetedLimited,
        BucketKey::TargetedUnlimited,
    ];

    fn common(limited: bool) -> Self {
        if limited {
            BucketKey::CommonLimited
        } else {
            BucketKey::CommonUnlimited
        }
    }

    fn regional(limited: bool) -> Self {
        if limited {
            BucketKey::RegionalLimited
        } else {
            BucketKey::RegionalUnlimited
        }
    }

    fn targeted(limited: bool) -> Self {
        if limited {
            BucketKey::TargetedLimited
        } else {
            BucketKey::TargetedUnlimited
        }
    }
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BucketKey::CommonLimited => "common_limited",
            BucketKey::CommonUnlimited => "common_unlimited",
            BucketKey::RegionalLimited => "regional_limited",
            BucketKey::RegionalUnlimited => "regional_unlimited",
            BucketKey::TargetedLimited => "targeted_limited",
            BucketKey::TargetedUnlimited => "targeted_unlimited",
        };
        write!(f, "{}", name)
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Classify a package into its base bucket
///
/// Rules are evaluated in priority order; the order must not change.
/// Rules 3 and 4 overlap on purpose: rule 4 catches public-free items
/// whose flow type falls outside rule 3.
pub fn determine_bucket_key(pkg: &Package) -> BucketKey {
    let limited = pkg.total > 0.0;
    let common_resource = matches!(pkg.resource_type.as_str(), "01" | "1");
    let targeted_resource = matches!(pkg.resource_type.as_str(), "13" | "I3");
    let regional_flow = matches!(pkg.flow_type.as_str(), "2" | "3");

    if pkg.flow_type == "1" && common_resource {
        return BucketKey::common(limited);
    }
    if regional_flow && common_resource {
        return BucketKey::regional(limited);
    }
    if regional_flow && targeted_resource {
        return BucketKey::targeted(limited);
    }
    if pkg.is_public_free || targeted_resource {
        return BucketKey::targeted(limited);
    }
    BucketKey::common(limited)
}

// ============================================================================
// Bucket / BucketSet
// ============================================================================

/// Summed total/used/remain for one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub total: f64,
    pub used: f64,
    pub remain: f64,
}

impl Bucket {
    fn add_package(&mut self, pkg: &Package) {
        self.total += pkg.total;
        self.used += pkg.used;
        self.remain += pkg.remain;
    }

    /// Roll another bucket into this one
    ///
    /// An unlimited source (total == 0) contributes used but not remain.
    fn accumulate(&mut self, other: &Bucket) {
        self.total += other.total;
        self.used += other.used;
        if other.total > 0.0 {
            self.remain += other.remain;
        }
    }
}

/// The six base buckets for one observation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketSet {
    pub common_limited: Bucket,
    pub common_unlimited: Bucket,
    pub regional_limited: Bucket,
    pub regional_unlimited: Bucket,
    pub targeted_limited: Bucket,
    pub targeted_unlimited: Bucket,
}

impl BucketSet {
    /// Sum a package list into base buckets by classification
    pub fn from_packages(packages: &[Package]) -> Self {
        let mut set = Self::default();
        for pkg in packages {
            set.get_mut(determine_bucket_key(pkg)).add_package(pkg);
        }
        set
    }

    pub fn get(&self, key: BucketKey) -> &Bucket {
        match key {
            BucketKey::CommonLimited => &self.common_limited,
            BucketKey::CommonUnlimited => &self.common_unlimited,
            BucketKey::RegionalLimited => &self.regional_limited,
            BucketKey::RegionalUnlimited => &self.regional_unlimited,
            BucketKey::TargetedLimited => &self.targeted_limited,
            BucketKey::TargetedUnlimited => &self.targeted_unlimited,
        }
    }

    fn get_mut(&mut self, key: BucketKey) -> &mut Bucket {
        match key {
            BucketKey::CommonLimited => &mut self.common_limited,
            BucketKey::CommonUnlimited => &mut self.common_unlimited,
            BucketKey::RegionalLimited => &mut self.regional_limited,
            BucketKey::RegionalUnlimited => &mut self.regional_unlimited,
            BucketKey::TargetedLimited => &mut self.targeted_limited,
            BucketKey::TargetedUnlimited => &mut self.targeted_unlimited,
        }
    }

    /// Aggregate of the four common + regional buckets
    pub fn all_common(&self) -> Bucket {
        let mut agg = Bucket::default();
        agg.accumulate(&self.common_limited);
        agg.accumulate(&self.common_unlimited);
        agg.accumulate(&self.regional_limited);
        agg.accumulate(&self.regional_unlimited);
        agg
    }

    /// Aggregate of the two targeted buckets
    pub fn all_targeted_free(&self) -> Bucket {
        let mut agg = Bucket::default();
        agg.accumulate(&self.targeted_limited);
        agg.accumulate(&self.targeted_unlimited);
        agg
    }

    /// Aggregate of the two aggregates above
    pub fn all_traffic(&self) -> Bucket {
        let mut agg = Bucket::default();
        agg.accumulate(&self.all_common());
        agg.accumulate(&self.all_targeted_free());
        agg
    }
}

// ============================================================================
// Tests
// ============================================================================
