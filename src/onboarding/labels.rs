//! Human-readable labels for profile values and wizard steps.

use super::model::{
    ExplanationStyle, LiquidityLevel, MarketUniverse, PortfolioStyle, RiskLevel, TraderType,
};
use super::state::{TOTAL_STEPS, WizardStep};

pub fn trader_type(value: TraderType) -> &'static str {
    match value {
        TraderType::Day => "Day Trader",
        TraderType::Swing => "Swing Trader",
        TraderType::LongTerm => "Long-term Investor",
    }
}

pub fn risk_level(value: RiskLevel) -> &'static str {
    match value {
        RiskLevel::Low => "Low Risk (0.5% per trade)",
        RiskLevel::Medium => "Medium Risk (1% per trade)",
        RiskLevel::High => "High Risk (1.5-2% per trade)",
    }
}

pub fn portfolio_style(value: PortfolioStyle) -> &'static str {
    match value {
        PortfolioStyle::Momentum => "Momentum Plays",
        PortfolioStyle::Value => "Value/Reversal Setups",
        PortfolioStyle::AiMix => "AI-Picked Mix",
        PortfolioStyle::Custom => "Custom Filter",
    }
}

pub fn market_universe(value: MarketUniverse) -> &'static str {
    match value {
        MarketUniverse::Nasdaq => "NASDAQ",
        MarketUniverse::Sp500 => "S&P 500",
        MarketUniverse::Russell2000 => "Russell 2000",
        MarketUniverse::Custom => "Custom Watchlist",
    }
}

pub fn liquidity_level(value: LiquidityLevel) -> &'static str {
    match value {
        LiquidityLevel::High => "High Liquidity (≥ 2M shares/day)",
        LiquidityLevel::Moderate => "Moderate (≥ 500K shares/day)",
        LiquidityLevel::Flexible => "Flexible (no restriction)",
    }
}

pub fn explanation_style(value: ExplanationStyle) -> &'static str {
    match value {
        ExplanationStyle::Simple => "Simple (Plain English)",
        ExplanationStyle::Trader => "Trader (Technical Terms)",
        ExplanationStyle::Quant => "Quant (Full Algorithmic Breakdown)",
    }
}

/// Title shown above a step.
pub fn step_title(step: WizardStep) -> &'static str {
    match step {
        WizardStep::TraderType => "Trader Type",
        WizardStep::RiskLevel => "Risk Level",
        WizardStep::RiskReward => "Risk-Reward Ratio",
        WizardStep::PortfolioStyle => "Portfolio Style",
        WizardStep::MarketUniverse => "Market Universe",
        WizardStep::Liquidity => "Liquidity Preference",
        WizardStep::MaxTrades => "Max Concurrent Trades",
        WizardStep::AdvancedSettings => "Advanced Settings",
        WizardStep::ExplanationStyle => "Explanation Style",
    }
}

/// Label of the forward button on a step.
pub fn advance_label(step_index: usize) -> &'static str {
    if step_index + 1 >= TOTAL_STEPS {
        "Complete Setup"
    } else {
        "Next"
    }
}

/// Whole-number progress through the wizard, counting the current step.
pub fn progress_percent(step_index: usize) -> u8 {
    let shown = (step_index + 1).min(TOTAL_STEPS);
    ((shown as f64 / TOTAL_STEPS as f64) * 100.0).round() as u8
}
