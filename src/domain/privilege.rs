use std::{borrow::Cow, collections::HashMap};

use serde_json::Value;
use uuid::Uuid;

use super::tier::Tier;

/// Action type granting a fixed number of points
pub const EARN_POINTS: &str = "EARN_POINTS";
/// Action type converting a percentage of a purchase into points
pub const EXAMPLE_DISCOUNT: &str = "EXAMPLE_DISCOUNT";

/// Lot source for points granted by [`EARN_POINTS`] privileges
pub const PRIVILEGE_BENEFIT_SOURCE: &str = "PRIVILEGE_BENEFIT";
/// Lot source for points granted by [`EXAMPLE_DISCOUNT`] privileges
pub const PRIVILEGE_DISCOUNT_SOURCE: &str = "PRIVILEGE_DISCOUNT";

/// Request parameter holding the purchase amount for discount privileges
pub const ORIGINAL_COST_PARAM: &str = "originalCost";

/// Free-form parameters sent along with a benefit request
pub type BenefitParams = HashMap<String, Value>;

#[derive(Clone, Debug, PartialEq)]
pub struct Privilege {
    pub privilege_id: Uuid,
    /// Unique display name
    pub name: String,
    pub description: Option<String>,
    /// Lowest tier allowed to use this privilege
    pub min_tier: Tier,
    /// Inactive privileges can be listed but not used
    pub active: bool,
    /// Selects how the benefit is applied
    ///
    /// Kept as a string since new benefit types are added over time.
    pub benefit_action_type: Option<String>,
    /// Point amount or percentage, depending on the action type
    pub benefit_point_amount: Option<i32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BenefitAction {
    EarnPoints,
    DiscountToPoints,
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum BenefitError {
    #[error("privilege {privilege_id} has no benefit action type")]
    MissingAction { privilege_id: Uuid },

    #[error("privilege {privilege_id} has unsupported benefit action type '{action_type}'")]
    UnrecognizedAction {
        privilege_id: Uuid,
        action_type: String,
    },

    #[error("privilege {name} ({privilege_id}) is misconfigured: {reason}")]
    InvalidConfiguration {
        privilege_id: Uuid,
        name: String,
        reason: Cow<'static, str>,
    },

    #[error("invalid parameters for privilege {privilege_id}: {reason}")]
    InvalidParameters {
        privilege_id: Uuid,
        reason: Cow<'static, str>,
    },
}

/// Points to issue as the result of a benefit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointGrant {
    pub points: u32,
    pub source: &'static str,
    pub description: String,
}

/// Outcome of applying a privilege, before it touches the ledger
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BenefitEffect {
    /// `None` when the benefit is worth zero points
    pub grant: Option<PointGrant>,
    /// Usage log notes
    pub notes: String,
}

impl Privilege {
    pub fn benefit_action(&self) -> Result<BenefitAction, BenefitError> {
        match self.benefit_action_type.as_deref() {
            None => Err(BenefitError::MissingAction {
                privilege_id: self.privilege_id,
            }),
            Some(EARN_POINTS) => Ok(BenefitAction::EarnPoints),
            Some(EXAMPLE_DISCOUNT) => Ok(BenefitAction::DiscountToPoints),
            Some(other) => Err(BenefitError::UnrecognizedAction {
                privilege_id: self.privilege_id,
                action_type: other.to_string(),
            }),
        }
    }

    /// Compute what using this privilege is worth
    pub fn benefit_effect(&self, params: &BenefitParams) -> Result<BenefitEffect, BenefitError> {
        match self.benefit_action()? {
            BenefitAction::EarnPoints => self.earn_points_effect(),
            BenefitAction::DiscountToPoints => self.discount_effect(params),
        }
    }

    fn earn_points_effect(&self) -> Result<BenefitEffect, BenefitError> {
        let points = match self.benefit_point_amount {
            Some(amount) if amount > 0 => amount as u32,
            _ => {
                return Err(self.misconfigured(
                    "EARN_POINTS privilege has no valid point amount",
                ))
            }
        };

        Ok(BenefitEffect {
            grant: Some(PointGrant {
                points,
                source: PRIVILEGE_BENEFIT_SOURCE,
                description: format!("Earned points via privilege: {}", self.name),
            }),
            notes: format!("Used privilege: {} to earn {} points.", self.name, points),
        })
    }

    fn discount_effect(&self, params: &BenefitParams) -> Result<BenefitEffect, BenefitError> {
        let original_cost = params
            .get(ORIGINAL_COST_PARAM)
            .and_then(Value::as_f64)
            .ok_or_else(|| BenefitError::InvalidParameters {
                privilege_id: self.privilege_id,
                reason: "missing or non-numeric 'originalCost'".into(),
            })?;

        let percentage = match self.benefit_point_amount {
            Some(amount @ 1..=100) => amount,
            _ => {
                return Err(self.misconfigured(
                    "EXAMPLE_DISCOUNT privilege has no valid discount percentage (1-100)",
                ))
            }
        };

        let points = discount_points(original_cost, percentage).ok_or_else(|| {
            BenefitError::InvalidParameters {
                privilege_id: self.privilege_id,
                reason: format!("'originalCost' {original_cost:?} is out of range").into(),
            }
        })?;

        // `{:?}` keeps the decimal point on whole amounts, e.g. `200.0`
        if points > 0 {
            Ok(BenefitEffect {
                grant: Some(PointGrant {
                    points,
                    source: PRIVILEGE_DISCOUNT_SOURCE,
                    description: format!("Discount via privilege: {}", self.name),
                }),
                notes: format!(
                    "Used privilege: {} for a discount equivalent to {} points on an item costing {:?}.",
                    self.name, points, original_cost
                ),
            })
        } else {
            Ok(BenefitEffect {
                grant: None,
                notes: format!(
                    "Used privilege: {} for a discount on an item costing {:?}, but discount amount was zero points.",
                    self.name, original_cost
                ),
            })
        }
    }

    fn misconfigured(&self, reason: &'static str) -> BenefitError {
        BenefitError::InvalidConfiguration {
            privilege_id: self.privilege_id,
            name: self.name.clone(),
            reason: reason.into(),
        }
    }
}

/// `floor(original_cost * percentage / 100)`, clamped at zero
///
/// The cost is multiplied by the whole percentage before dividing, so exact products such as
/// 29% of 100.0 are not lost to a fractional rate.
///
/// Returns `None` if the result does not fit in a point amount.
fn discount_points(original_cost: f64, percentage: i32) -> Option<u32> {
    let points = (original_cost * f64::from(percentage) / 100.0).floor();
    if !points.is_finite() || points > f64::from(u32::MAX) {
        return None;
    }
    if points < 1.0 {
        return Some(0);
    }
    Some(points as u32)
}
