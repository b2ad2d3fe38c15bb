//! Trader profile and onboarding data models.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

use super::labels;

/// Declares a closed string enum whose `Display`, `FromStr` and serde forms
/// all share one wire spelling per variant.
macro_rules! closed_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($field:literal) {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every value, in presentation order.
            pub const ALL: &'static [$name] = &[ $( $name::$variant ),+ ];

            /// Wire spelling of the value.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $wire ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $wire => Ok(Self::$variant), )+
                    other => Err(ValidationError::UnknownValue {
                        field: $field,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

closed_enum! {
    /// Holding horizon the user trades on.
    TraderType ("traderType") {
        Day => "day",
        Swing => "swing",
        LongTerm => "long-term",
    }
}

closed_enum! {
    /// Risk taken per trade.
    RiskLevel ("riskLevel") {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

closed_enum! {
    /// Minimum reward relative to risk.
    RiskRewardRatio ("riskRewardRatio") {
        OneToTwo => "1:2",
        OneToThree => "1:3",
        OneToFour => "1:4",
        OneToFive => "1:5",
    }
}

closed_enum! {
    /// Kind of setups the user wants surfaced.
    PortfolioStyle ("portfolioStyles") {
        Momentum => "momentum",
        Value => "value",
        AiMix => "ai-mix",
        Custom => "custom",
    }
}

closed_enum! {
    /// Index universe to scan.
    MarketUniverse ("marketUniverse") {
        Nasdaq => "nasdaq",
        Sp500 => "sp500",
        Russell2000 => "russell2000",
        Custom => "custom",
    }
}

closed_enum! {
    /// Minimum average daily volume.
    LiquidityLevel ("liquidityLevel") {
        High => "high",
        Moderate => "moderate",
        Flexible => "flexible",
    }
}

closed_enum! {
    /// How trade explanations are worded.
    ExplanationStyle ("explanationStyle") {
        Simple => "simple",
        Trader => "trader",
        Quant => "quant",
    }
}

/// Maximum number of concurrent trades, always within `1..=10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct MaxTrades(u8);

impl MaxTrades {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ValidationError::MaxTradesOutOfRange { value })
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for MaxTrades {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MaxTrades> for u8 {
    fn from(value: MaxTrades) -> Self {
        value.0
    }
}

impl Default for MaxTrades {
    fn default() -> Self {
        Self(5)
    }
}

/// Leverage multiplier. Only 1x, 2x and 5x are offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Leverage {
    #[default]
    X1,
    X2,
    X5,
}

impl TryFrom<u8> for Leverage {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::X1),
            2 => Ok(Self::X2),
            5 => Ok(Self::X5),
            value => Err(ValidationError::UnsupportedLeverage { value }),
        }
    }
}

impl From<Leverage> for u8 {
    fn from(value: Leverage) -> Self {
        match value {
            Leverage::X1 => 1,
            Leverage::X2 => 2,
            Leverage::X5 => 5,
        }
    }
}

/// Optional fine-tuning collected on the advanced-settings step.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_size: Option<Decimal>,
    #[serde(default)]
    pub preferred_sectors: Vec<String>,
    #[serde(default)]
    pub leverage: Leverage,
    #[serde(default)]
    pub volatility_filter: bool,
}

/// A user's trading preferences, built during onboarding.
///
/// `portfolio_styles` and `market_universe` behave as sets: duplicates are
/// dropped on update while insertion order is kept for stable rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraderProfile {
    pub trader_type: TraderType,
    pub risk_level: RiskLevel,
    pub risk_reward_ratio: RiskRewardRatio,
    pub portfolio_styles: Vec<PortfolioStyle>,
    pub market_universe: Vec<MarketUniverse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_watchlist: Option<Vec<String>>,
    pub liquidity_level: LiquidityLevel,
    pub max_trades: MaxTrades,
    pub explanation_style: ExplanationStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advanced_settings: Option<AdvancedSettings>,
}

impl Default for TraderProfile {
    fn default() -> Self {
        Self {
            trader_type: TraderType::Swing,
            risk_level: RiskLevel::Medium,
            risk_reward_ratio: RiskRewardRatio::OneToThree,
            portfolio_styles: Vec::new(),
            market_universe: vec![MarketUniverse::Nasdaq],
            custom_watchlist: None,
            liquidity_level: LiquidityLevel::Moderate,
            max_trades: MaxTrades::default(),
            explanation_style: ExplanationStyle::Simple,
            advanced_settings: None,
        }
    }
}

/// A single field update to a draft profile.
///
/// On the wire: `{"field": "maxTrades", "value": 7}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum ProfileUpdate {
    TraderType(TraderType),
    RiskLevel(RiskLevel),
    RiskRewardRatio(RiskRewardRatio),
    PortfolioStyles(Vec<PortfolioStyle>),
    MarketUniverse(Vec<MarketUniverse>),
    CustomWatchlist(Option<Vec<String>>),
    LiquidityLevel(LiquidityLevel),
    MaxTrades(MaxTrades),
    ExplanationStyle(ExplanationStyle),
    AdvancedSettings(Option<AdvancedSettings>),
}

static TICKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z][A-Z0-9.\-]{0,9}$").expect("valid ticker regex")
});

impl ProfileUpdate {
    /// Reject values the type system alone cannot rule out.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::CustomWatchlist(Some(tickers)) => {
                for ticker in tickers {
                    if !TICKER_RE.is_match(ticker) {
                        return Err(ValidationError::InvalidTicker(ticker.clone()));
                    }
                }
                Ok(())
            }
            Self::AdvancedSettings(Some(settings)) => match settings.account_size {
                Some(size) if size <= Decimal::ZERO => Err(ValidationError::NonPositiveAccountSize),
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }
}

/// Drop repeated values, keeping the first occurrence.
fn dedup_ordered<T: PartialEq>(values: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(values.len());
    for v in values {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

/// Parse a comma-separated ticker list as typed by the user.
pub fn parse_watchlist(raw: &str) -> Result<Vec<String>, ValidationError> {
    let tickers: Vec<String> = raw
        .split(',')
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect();
    for ticker in &tickers {
        if !TICKER_RE.is_match(ticker) {
            return Err(ValidationError::InvalidTicker(ticker.clone()));
        }
    }
    Ok(dedup_ordered(tickers))
}

impl TraderProfile {
    /// Apply one already-validated update, leaving every other field as is.
    fn apply(&mut self, update: ProfileUpdate) {
        match update {
            ProfileUpdate::TraderType(v) => self.trader_type = v,
            ProfileUpdate::RiskLevel(v) => self.risk_level = v,
            ProfileUpdate::RiskRewardRatio(v) => self.risk_reward_ratio = v,
            ProfileUpdate::PortfolioStyles(v) => self.portfolio_styles = dedup_ordered(v),
            ProfileUpdate::MarketUniverse(v) => self.market_universe = dedup_ordered(v),
            ProfileUpdate::CustomWatchlist(v) => self.custom_watchlist = v.map(dedup_ordered),
            ProfileUpdate::LiquidityLevel(v) => self.liquidity_level = v,
            ProfileUpdate::MaxTrades(v) => self.max_trades = v,
            ProfileUpdate::ExplanationStyle(v) => self.explanation_style = v,
            ProfileUpdate::AdvancedSettings(v) => {
                self.advanced_settings = v.map(|mut s| {
                    s.preferred_sectors = dedup_ordered(s.preferred_sectors);
                    s
                })
            }
        }
    }

    /// Return a copy with `updates` merged in.
    ///
    /// All updates are validated before any is applied, so a rejected batch
    /// leaves nothing half-merged.
    pub fn merged<I>(&self, updates: I) -> Result<TraderProfile, ValidationError>
    where
        I: IntoIterator<Item = ProfileUpdate>,
    {
        let updates: Vec<ProfileUpdate> = updates.into_iter().collect();
        for update in &updates {
            update.validate()?;
        }
        let mut next = self.clone();
        for update in updates {
            next.apply(update);
        }
        Ok(next)
    }

    /// The update that adds `style` if absent, or removes it if present.
    pub fn toggle_portfolio_style(&self, style: PortfolioStyle) -> ProfileUpdate {
        let mut styles = self.portfolio_styles.clone();
        if styles.contains(&style) {
            styles.retain(|s| *s != style);
        } else {
            styles.push(style);
        }
        ProfileUpdate::PortfolioStyles(styles)
    }

    /// The update that adds `market` if absent, or removes it if present.
    pub fn toggle_market(&self, market: MarketUniverse) -> ProfileUpdate {
        let mut markets = self.market_universe.clone();
        if markets.contains(&market) {
            markets.retain(|m| *m != market);
        } else {
            markets.push(market);
        }
        ProfileUpdate::MarketUniverse(markets)
    }

    /// Updates for a custom watchlist typed as `"aapl, msft"`.
    ///
    /// Blank input yields no updates. A non-empty list also selects the
    /// `custom` market if it isn't selected yet.
    pub fn watchlist_updates(&self, raw: &str) -> Result<Vec<ProfileUpdate>, ValidationError> {
        let tickers = parse_watchlist(raw)?;
        if tickers.is_empty() {
            return Ok(Vec::new());
        }
        let mut updates = Vec::with_capacity(2);
        if !self.market_universe.contains(&MarketUniverse::Custom) {
            let mut markets = self.market_universe.clone();
            markets.push(MarketUniverse::Custom);
            updates.push(ProfileUpdate::MarketUniverse(markets));
        }
        updates.push(ProfileUpdate::CustomWatchlist(Some(tickers)));
        Ok(updates)
    }

    /// Render the profile as a markdown section (completed view, profile page).
    pub fn to_summary_section(&self) -> String {
        let mut parts = vec!["# Trading Profile".to_string()];

        parts.push(format!("- **Trader type:** {}", labels::trader_type(self.trader_type)));
        parts.push(format!("- **Risk level:** {}", labels::risk_level(self.risk_level)));
        parts.push(format!("- **Risk-reward ratio:** {}", self.risk_reward_ratio));

        if !self.portfolio_styles.is_empty() {
            let styles: Vec<&str> = self
                .portfolio_styles
                .iter()
                .map(|s| labels::portfolio_style(*s))
                .collect();
            parts.push(format!("- **Portfolio styles:** {}", styles.join(", ")));
        }

        if !self.market_universe.is_empty() {
            let markets: Vec<&str> = self
                .market_universe
                .iter()
                .map(|m| labels::market_universe(*m))
                .collect();
            parts.push(format!("- **Markets:** {}", markets.join(", ")));
        }

        if let Some(ref watchlist) = self.custom_watchlist {
            if !watchlist.is_empty() {
                parts.push(format!("- **Watchlist:** {}", watchlist.join(", ")));
            }
        }

        parts.push(format!("- **Liquidity:** {}", labels::liquidity_level(self.liquidity_level)));
        parts.push(format!("- **Max concurrent trades:** {}", self.max_trades.get()));
        parts.push(format!(
            "- **Explanations:** {}",
            labels::explanation_style(self.explanation_style)
        ));

        if let Some(ref advanced) = self.advanced_settings {
            if let Some(size) = advanced.account_size {
                parts.push(format!("- **Account size:** ${size}"));
            }
            if !advanced.preferred_sectors.is_empty() {
                parts.push(format!(
                    "- **Preferred sectors:** {}",
                    advanced.preferred_sectors.join(", ")
                ));
            }
            parts.push(format!("- **Leverage:** {}x", u8::from(advanced.leverage)));
            if advanced.volatility_filter {
                parts.push("- **Volatility filter:** on".to_string());
            }
        }

        parts.join("\n")
    }
}

/// Local durability marker keys.
pub mod marker_keys {
    /// Key holding `true` once onboarding was committed on this device.
    pub const ONBOARDING_COMPLETED: &str = "onboarding-completed";
    /// Key holding the last committed profile JSON.
    pub const ONBOARDING_DATA: &str = "onboarding-data";
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn default_profile_matches_documented_defaults() {
        let p = TraderProfile::default();
        assert_eq!(p.trader_type, TraderType::Swing);
        assert_eq!(p.risk_level, RiskLevel::Medium);
        assert_eq!(p.risk_reward_ratio, RiskRewardRatio::OneToThree);
        assert!(p.portfolio_styles.is_empty());
        assert_eq!(p.market_universe, vec![MarketUniverse::Nasdaq]);
        assert_eq!(p.liquidity_level, LiquidityLevel::Moderate);
        assert_eq!(p.max_trades.get(), 5);
        assert_eq!(p.explanation_style, ExplanationStyle::Simple);
        assert!(p.custom_watchlist.is_none());
        assert!(p.advanced_settings.is_none());
    }

    #[test]
    fn default_profile_wire_shape() {
        let json = serde_json::to_value(TraderProfile::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "traderType": "swing",
                "riskLevel": "medium",
                "riskRewardRatio": "1:3",
                "portfolioStyles": [],
                "marketUniverse": ["nasdaq"],
                "liquidityLevel": "moderate",
                "maxTrades": 5,
                "explanationStyle": "simple"
            })
        );
    }

    #[test]
    fn merge_keeps_untouched_fields() {
        let base = TraderProfile::default();
        let step1 = base
            .merged([ProfileUpdate::MaxTrades(MaxTrades::new(7).unwrap())])
            .unwrap();
        let step2 = step1
            .merged([ProfileUpdate::RiskLevel(RiskLevel::High)])
            .unwrap();

        assert_eq!(step2.max_trades.get(), 7);
        assert_eq!(step2.risk_level, RiskLevel::High);
        assert_eq!(
            TraderProfile {
                max_trades: base.max_trades,
                risk_level: base.risk_level,
                ..step2.clone()
            },
            base
        );
    }

    #[test]
    fn max_trades_bounds() {
        assert!(MaxTrades::new(1).is_ok());
        assert!(MaxTrades::new(10).is_ok());
        assert_eq!(
            MaxTrades::new(0),
            Err(ValidationError::MaxTradesOutOfRange { value: 0 })
        );
        assert!(MaxTrades::new(11).is_err());
        assert!(serde_json::from_str::<MaxTrades>("11").is_err());
        assert!(serde_json::from_str::<MaxTrades>("-3").is_err());
    }

    #[test]
    fn unknown_enum_values_are_rejected() {
        assert!(serde_json::from_str::<TraderType>("\"scalper\"").is_err());
        assert!(serde_json::from_str::<RiskRewardRatio>("\"1:10\"").is_err());
        assert_eq!(
            "aggressive".parse::<RiskLevel>(),
            Err(ValidationError::UnknownValue {
                field: "riskLevel",
                value: "aggressive".into()
            })
        );

        let bad = serde_json::json!({"field": "liquidityLevel", "value": "extreme"});
        assert!(serde_json::from_value::<ProfileUpdate>(bad).is_err());
    }

    #[test]
    fn display_matches_serde() {
        for ratio in RiskRewardRatio::ALL {
            assert_eq!(
                format!("\"{ratio}\""),
                serde_json::to_string(ratio).unwrap()
            );
        }
        for style in PortfolioStyle::ALL {
            let back: PortfolioStyle = style.as_str().parse().unwrap();
            assert_eq!(back, *style);
        }
    }

    #[test]
    fn leverage_only_accepts_offered_values() {
        assert_eq!(Leverage::try_from(2), Ok(Leverage::X2));
        assert!(Leverage::try_from(3).is_err());
        assert!(serde_json::from_str::<Leverage>("10").is_err());
        assert_eq!(serde_json::to_string(&Leverage::X5).unwrap(), "5");
    }

    #[test]
    fn set_fields_drop_duplicates_in_order() {
        let p = TraderProfile::default()
            .merged([ProfileUpdate::PortfolioStyles(vec![
                PortfolioStyle::Value,
                PortfolioStyle::Momentum,
                PortfolioStyle::Value,
            ])])
            .unwrap();
        assert_eq!(
            p.portfolio_styles,
            vec![PortfolioStyle::Value, PortfolioStyle::Momentum]
        );
    }

    #[test]
    fn rejected_batch_applies_nothing() {
        let base = TraderProfile::default();
        let result = base.merged([
            ProfileUpdate::RiskLevel(RiskLevel::Low),
            ProfileUpdate::AdvancedSettings(Some(AdvancedSettings {
                account_size: Some(dec!(-100)),
                ..Default::default()
            })),
        ]);
        assert_eq!(result, Err(ValidationError::NonPositiveAccountSize));
        assert_eq!(base.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn toggles_add_then_remove() {
        let p = TraderProfile::default();
        let added = p
            .merged([p.toggle_portfolio_style(PortfolioStyle::AiMix)])
            .unwrap();
        assert_eq!(added.portfolio_styles, vec![PortfolioStyle::AiMix]);

        let removed = added
            .merged([added.toggle_portfolio_style(PortfolioStyle::AiMix)])
            .unwrap();
        assert!(removed.portfolio_styles.is_empty());

        let markets = p.merged([p.toggle_market(MarketUniverse::Nasdaq)]).unwrap();
        assert!(markets.market_universe.is_empty());
    }

    #[test]
    fn watchlist_input_is_normalized() {
        assert_eq!(
            parse_watchlist(" aapl, msft ,, brk.b ").unwrap(),
            vec!["AAPL", "MSFT", "BRK.B"]
        );
        assert!(parse_watchlist("   ").unwrap().is_empty());
        assert!(matches!(
            parse_watchlist("aapl, $$$"),
            Err(ValidationError::InvalidTicker(_))
        ));
    }

    #[test]
    fn watchlist_updates_select_custom_market_once() {
        let p = TraderProfile::default();
        let updates = p.watchlist_updates("tsla,nvda").unwrap();
        let next = p.merged(updates).unwrap();
        assert_eq!(
            next.market_universe,
            vec![MarketUniverse::Nasdaq, MarketUniverse::Custom]
        );
        assert_eq!(
            next.custom_watchlist,
            Some(vec!["TSLA".to_string(), "NVDA".to_string()])
        );

        let again = next.watchlist_updates("amd").unwrap();
        assert_eq!(again.len(), 1);
        assert!(p.watchlist_updates("").unwrap().is_empty());
    }

    #[test]
    fn profile_update_wire_format() {
        let json = serde_json::json!({"field": "maxTrades", "value": 7});
        let update: ProfileUpdate = serde_json::from_value(json).unwrap();
        assert_eq!(update, ProfileUpdate::MaxTrades(MaxTrades::new(7).unwrap()));

        let clear = serde_json::json!({"field": "advancedSettings", "value": null});
        let update: ProfileUpdate = serde_json::from_value(clear).unwrap();
        assert_eq!(update, ProfileUpdate::AdvancedSettings(None));
    }

    #[test]
    fn summary_section_includes_key_fields() {
        let profile = TraderProfile {
            trader_type: TraderType::Day,
            portfolio_styles: vec![PortfolioStyle::Momentum],
            custom_watchlist: Some(vec!["AAPL".into()]),
            advanced_settings: Some(AdvancedSettings {
                account_size: Some(dec!(25000)),
                preferred_sectors: vec!["Energy".into()],
                leverage: Leverage::X2,
                volatility_filter: true,
            }),
            ..Default::default()
        };

        let section = profile.to_summary_section();
        assert!(section.contains("Day Trader"));
        assert!(section.contains("Momentum Plays"));
        assert!(section.contains("NASDAQ"));
        assert!(section.contains("AAPL"));
        assert!(section.contains("$25000"));
        assert!(section.contains("Energy"));
        assert!(section.contains("2x"));
        assert!(section.contains("Volatility filter"));
    }

    #[test]
    fn summary_section_minimal_profile() {
        let section = TraderProfile::default().to_summary_section();
        assert!(section.contains("Swing Trader"));
        assert!(!section.contains("Portfolio styles"));
        assert!(!section.contains("Watchlist"));
        assert!(!section.contains("Leverage"));
    }
}
