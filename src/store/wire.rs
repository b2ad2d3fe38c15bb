//! Canonical wire row for the `user_profiles` record.
//!
//! One row per identity, keyed by `user_id`, snake_case columns.
//! `portfolio_styles` is a list (multi-select).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::onboarding::model::{
    AdvancedSettings, ExplanationStyle, LiquidityLevel, MarketUniverse, MaxTrades,
    PortfolioStyle, RiskLevel, RiskRewardRatio, TraderProfile, TraderType,
};
use crate::session::IdentityId;

use super::traits::PersistedProfile;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub user_id: String,
    pub trader_type: TraderType,
    pub risk_level: RiskLevel,
    pub risk_reward_ratio: RiskRewardRatio,
    #[serde(default)]
    pub portfolio_styles: Vec<PortfolioStyle>,
    #[serde(default)]
    pub market_universe: Vec<MarketUniverse>,
    #[serde(default)]
    pub custom_watchlist: Option<Vec<String>>,
    pub liquidity_level: LiquidityLevel,
    pub max_trades: MaxTrades,
    pub explanation_style: ExplanationStyle,
    #[serde(default)]
    pub advanced_settings: Option<AdvancedSettings>,
    #[serde(default)]
    pub onboarding_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProfileRow {
    /// Row written by `save_profile`.
    pub fn for_upsert(identity: &IdentityId, profile: &TraderProfile) -> Self {
        let p = profile.clone();
        Self {
            user_id: identity.as_str().to_string(),
            trader_type: p.trader_type,
            risk_level: p.risk_level,
            risk_reward_ratio: p.risk_reward_ratio,
            portfolio_styles: p.portfolio_styles,
            market_universe: p.market_universe,
            custom_watchlist: p.custom_watchlist,
            liquidity_level: p.liquidity_level,
            max_trades: p.max_trades,
            explanation_style: p.explanation_style,
            advanced_settings: p.advanced_settings,
            onboarding_completed: true,
            updated_at: Some(Utc::now()),
        }
    }

    pub fn into_persisted(self) -> Result<PersistedProfile, StoreError> {
        let identity_id = IdentityId::new(self.user_id)
            .ok_or_else(|| StoreError::Serialization("row has a blank user_id".into()))?;
        Ok(PersistedProfile {
            identity_id,
            profile: TraderProfile {
                trader_type: self.trader_type,
                risk_level: self.risk_level,
                risk_reward_ratio: self.risk_reward_ratio,
                portfolio_styles: self.portfolio_styles,
                market_universe: self.market_universe,
                custom_watchlist: self.custom_watchlist,
                liquidity_level: self.liquidity_level,
                max_trades: self.max_trades,
                explanation_style: self.explanation_style,
                advanced_settings: self.advanced_settings,
            },
            completed: self.onboarding_completed,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::model::Leverage;
    use rust_decimal_macros::dec;

    fn identity() -> IdentityId {
        IdentityId::new("user-1").unwrap()
    }

    #[test]
    fn row_uses_snake_case_columns() {
        let row = ProfileRow::for_upsert(&identity(), &TraderProfile::default());
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["user_id"], "user-1");
        assert_eq!(json["trader_type"], "swing");
        assert_eq!(json["risk_reward_ratio"], "1:3");
        assert_eq!(json["portfolio_styles"], serde_json::json!([]));
        assert_eq!(json["max_trades"], 5);
        assert_eq!(json["onboarding_completed"], true);
        assert!(json["advanced_settings"].is_null());
    }

    #[test]
    fn row_converts_back_without_loss() {
        let profile = TraderProfile {
            trader_type: TraderType::LongTerm,
            portfolio_styles: vec![PortfolioStyle::Value, PortfolioStyle::AiMix],
            market_universe: vec![MarketUniverse::Sp500, MarketUniverse::Custom],
            custom_watchlist: Some(vec!["AAPL".into(), "BRK.B".into()]),
            max_trades: MaxTrades::new(10).unwrap(),
            advanced_settings: Some(AdvancedSettings {
                account_size: Some(dec!(12500.50)),
                preferred_sectors: vec!["Technology".into()],
                leverage: Leverage::X5,
                volatility_filter: true,
            }),
            ..Default::default()
        };
        let row = ProfileRow::for_upsert(&identity(), &profile);
        let text = serde_json::to_string(&row).unwrap();
        let parsed: ProfileRow = serde_json::from_str(&text).unwrap();
        let persisted = parsed.into_persisted().unwrap();
        assert_eq!(persisted.profile, profile);
        assert!(persisted.completed);
        assert_eq!(persisted.identity_id, identity());
    }

    #[test]
    fn row_with_out_of_domain_value_fails_to_parse() {
        let json = serde_json::json!({
            "user_id": "u",
            "trader_type": "swing",
            "risk_level": "medium",
            "risk_reward_ratio": "1:3",
            "liquidity_level": "moderate",
            "max_trades": 42,
            "explanation_style": "simple"
        });
        assert!(serde_json::from_value::<ProfileRow>(json).is_err());
    }

    #[test]
    fn missing_optional_columns_default() {
        let json = serde_json::json!({
            "user_id": "u",
            "trader_type": "day",
            "risk_level": "low",
            "risk_reward_ratio": "1:2",
            "liquidity_level": "high",
            "max_trades": 3,
            "explanation_style": "quant"
        });
        let persisted = serde_json::from_value::<ProfileRow>(json)
            .unwrap()
            .into_persisted()
            .unwrap();
        assert!(!persisted.completed);
        assert!(persisted.profile.portfolio_styles.is_empty());
        assert!(persisted.profile.advanced_settings.is_none());
    }
}
