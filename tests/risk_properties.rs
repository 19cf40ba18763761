//! Cross-module behavior of the risk engine: known closed-form values,
//! reproducibility, and the relationships that must hold between VaR,
//! expected shortfall, component decomposition and stress results.

use portfolio_risk_rs::engine::{RiskEngine, RiskEngineConfig};
use portfolio_risk_rs::portfolio::{AssetId, Portfolio, PortfolioModel, Position, PricePoint};
use portfolio_risk_rs::risk::{RiskCalculator, RiskLimits};
use portfolio_risk_rs::simulation::{MonteCarloSimulator, SimulationConfig};
use portfolio_risk_rs::stress::{MarketShock, ShockScope, StressScenario, StressTester};
use portfolio_risk_rs::var::{
    ComponentRiskAllocator, ExpectedShortfallEngine, VaRMethod, ValueAtRiskEngine,
};

fn single_asset(volatility: f64) -> Portfolio {
    Portfolio::new(
        vec![Position::new(AssetId::new("SPY"), 100.0, 100.0).with_volatility(volatility)],
        "USD",
        0,
    )
}

fn history_from_returns(returns: &[f64]) -> Vec<PricePoint> {
    let mut price = 100.0;
    let mut points = vec![PricePoint::new(0, price)];
    for (i, r) in returns.iter().enumerate() {
        price *= 1.0 + r;
        points.push(PricePoint::new(i as u64 + 1, price));
    }
    points
}

#[test]
fn parametric_var_matches_normal_quantile() {
    // Zero-mean, σ = 2% daily, pv = 10_000: VaR(95%, h) = pv·1.645·σ·√h.
    let model = PortfolioModel::build(&single_asset(0.02)).unwrap();
    for horizon in [1u32, 5, 10] {
        let engine = ValueAtRiskEngine::new(0.95, horizon).unwrap();
        let var = engine.parametric(&model).unwrap();
        let expected = 10_000.0 * 1.645 * 0.02 * f64::from(horizon).sqrt();
        assert!(
            (var.value - expected).abs() / expected < 1e-3,
            "horizon {}: {} vs {}",
            horizon,
            var.value,
            expected
        );
    }
}

#[test]
fn historical_var_picks_exact_sorted_index() {
    // 100 known returns from -0.50 to 0.49; index floor(0.05·100) = 5 of the
    // ascending sort is -0.45.
    let returns: Vec<f64> = (0..100).map(|i| (i as f64 - 50.0) / 100.0).collect();
    let portfolio = Portfolio::new(
        vec![
            Position::new(AssetId::new("SPY"), 1.0, 100.0)
                .with_volatility(0.02)
                .with_history(history_from_returns(&returns)),
        ],
        "USD",
        0,
    );
    let model = PortfolioModel::build(&portfolio).unwrap();

    let engine = ValueAtRiskEngine::new(0.95, 1).unwrap();
    let var = engine.historical(&model).unwrap();
    assert!((var.value - 0.45 * model.total_value()).abs() < 1e-9);
}

#[test]
fn seeded_monte_carlo_is_bit_reproducible() {
    let model = PortfolioModel::build(&single_asset(0.02)).unwrap();
    let config = SimulationConfig {
        simulations: 10_000,
        seed: Some(1234),
        ..SimulationConfig::default()
    };

    let run = || {
        let simulator = MonteCarloSimulator::new(config.clone()).unwrap();
        ValueAtRiskEngine::new(0.99, 1)
            .unwrap()
            .monte_carlo(&model, &simulator)
            .unwrap()
            .value
    };
    assert_eq!(run().to_bits(), run().to_bits());
}

#[test]
fn expected_shortfall_dominates_var() {
    let model = PortfolioModel::build(&single_asset(0.02)).unwrap();
    let config = SimulationConfig {
        simulations: 20_000,
        seed: Some(5),
        ..SimulationConfig::default()
    };
    let scenarios = MonteCarloSimulator::new(config)
        .unwrap()
        .simulate(&model)
        .unwrap();

    for confidence in [0.90, 0.95, 0.99] {
        let es = ExpectedShortfallEngine::new(confidence, 1)
            .unwrap()
            .from_scenarios(&model, &scenarios)
            .unwrap();
        let var = ValueAtRiskEngine::new(confidence, 1)
            .unwrap()
            .monte_carlo_from_scenarios(&model, &scenarios)
            .unwrap();
        assert!(
            es.value >= var.value,
            "confidence {}: ES {} < VaR {}",
            confidence,
            es.value,
            var.value
        );
    }
}

#[test]
fn component_var_sums_to_total() {
    let c = AssetId::new("C");
    let portfolio = Portfolio::new(
        vec![
            Position::new(AssetId::new("A"), 100.0, 100.0)
                .with_volatility(0.02)
                .with_correlation(c.clone(), 0.2),
            Position::new(AssetId::new("B"), 40.0, 250.0).with_volatility(0.015),
            Position::new(c, 80.0, 50.0).with_volatility(0.03),
        ],
        "USD",
        0,
    );
    let model = PortfolioModel::build(&portfolio).unwrap();
    let allocator = ComponentRiskAllocator::new(0.95, 1).unwrap();

    // Parametric: exact.
    let parametric = allocator.parametric(&model).unwrap();
    let sum: f64 = parametric.components.iter().map(|x| x.component_var).sum();
    assert!((sum - parametric.total_var).abs() < 1e-9);

    // Monte Carlo finite difference: within 5%.
    let simulator = MonteCarloSimulator::new(SimulationConfig {
        simulations: 20_000,
        seed: Some(77),
        ..SimulationConfig::default()
    })
    .unwrap();
    let mc = allocator.monte_carlo(&portfolio, &simulator).unwrap();
    let mc_sum: f64 = mc.components.iter().map(|x| x.component_var).sum();
    assert!((mc_sum - mc.total_var).abs() / mc.total_var < 0.05);
}

#[test]
fn perfectly_correlated_portfolio_var_is_linear() {
    // With ρ = 1 everywhere, portfolio vol is the weighted sum of vols, so
    // VaR of the pair equals the sum of standalone VaRs.
    let b = AssetId::new("B");
    let pair = Portfolio::new(
        vec![
            Position::new(AssetId::new("A"), 100.0, 100.0)
                .with_volatility(0.02)
                .with_correlation(b.clone(), 1.0),
            Position::new(b, 100.0, 100.0).with_volatility(0.03),
        ],
        "USD",
        0,
    );
    let engine = ValueAtRiskEngine::new(0.95, 1).unwrap();
    let pair_var = engine
        .parametric(&PortfolioModel::build(&pair).unwrap())
        .unwrap()
        .value;

    let solo = |vol: f64| {
        let p = Portfolio::new(
            vec![Position::new(AssetId::new("X"), 100.0, 100.0).with_volatility(vol)],
            "USD",
            0,
        );
        engine
            .parametric(&PortfolioModel::build(&p).unwrap())
            .unwrap()
            .value
    };
    assert!((pair_var - (solo(0.02) + solo(0.03))).abs() < 1e-6);
}

#[test]
fn diversification_reduces_var() {
    let b = AssetId::new("B");
    let build = |rho: f64| {
        let p = Portfolio::new(
            vec![
                Position::new(AssetId::new("A"), 100.0, 100.0)
                    .with_volatility(0.02)
                    .with_correlation(b.clone(), rho),
                Position::new(b.clone(), 100.0, 100.0).with_volatility(0.02),
            ],
            "USD",
            0,
        );
        ValueAtRiskEngine::new(0.95, 1)
            .unwrap()
            .parametric(&PortfolioModel::build(&p).unwrap())
            .unwrap()
            .value
    };
    assert!(build(0.0) < build(1.0));
    assert!(build(-0.9) < build(0.0));
}

#[test]
fn zero_shock_stress_scenario_loses_nothing() {
    let portfolio = single_asset(0.02);
    let result = StressTester::default()
        .run_scenario(&portfolio, &StressScenario::new("noop", "no shocks"))
        .unwrap();
    assert_eq!(result.loss, 0.0);
    assert_eq!(result.stressed_value, result.initial_value);
}

#[test]
fn stress_losses_match_hand_computation() {
    let portfolio = Portfolio::new(
        vec![
            Position::new(AssetId::new("AAPL"), 100.0, 100.0)
                .with_volatility(0.02)
                .with_asset_class("equity"),
            Position::new(AssetId::new("TLT"), 100.0, 100.0)
                .with_volatility(0.01)
                .with_asset_class("bond"),
        ],
        "USD",
        0,
    );
    let scenario = StressScenario::new("mixed", "equities -30%, bonds +5%")
        .with_shock(MarketShock::new(
            ShockScope::AssetClass("equity".to_string()),
            -0.30,
        ))
        .with_shock(MarketShock::new(
            ShockScope::AssetClass("bond".to_string()),
            0.05,
        ));

    let result = StressTester::default()
        .run_scenario(&portfolio, &scenario)
        .unwrap();
    assert!((result.loss - (3_000.0 - 500.0)).abs() < 1e-9);
    assert!((result.position_impacts[0].loss - 3_000.0).abs() < 1e-9);
    assert!((result.position_impacts[1].loss + 500.0).abs() < 1e-9);
}

#[test]
fn engine_report_is_internally_consistent() {
    let portfolio = Portfolio::new(
        vec![
            Position::new(AssetId::new("AAPL"), 100.0, 100.0).with_volatility(0.02),
            Position::new(AssetId::new("MSFT"), 50.0, 200.0).with_volatility(0.018),
        ],
        "USD",
        42,
    );

    let config = RiskEngineConfig {
        var_method: VaRMethod::MonteCarlo,
        simulation: SimulationConfig {
            simulations: 10_000,
            seed: Some(2),
            ..SimulationConfig::default()
        },
        limits: RiskLimits::none().with_max_concentration(0.4).unwrap(),
        ..RiskEngineConfig::default()
    };
    let mut engine = RiskEngine::new(config).unwrap();
    let report = engine.evaluate(&portfolio).unwrap();
    let metrics = &report.metrics;

    assert_eq!(metrics.timestamp, 42);
    assert!((metrics.var.percentage - metrics.var.value / metrics.total_value).abs() < 1e-12);

    let es = metrics.expected_shortfall.as_ref().unwrap();
    assert!(es.value >= metrics.var.value);

    let weights: f64 = metrics.concentrations.iter().map(|(_, w)| w).sum();
    assert!((weights - 1.0).abs() < 1e-12);

    // Both positions sit at 50% weight, above the 40% concentration limit;
    // with no correlation data the matrix also flags low confidence.
    let concentration_alerts = report
        .alerts
        .iter()
        .filter(|a| a.alert_type.kind() == "concentration_limit")
        .count();
    assert_eq!(concentration_alerts, 2);
    assert!(
        report
            .alerts
            .iter()
            .any(|a| a.alert_type.kind() == "low_confidence_correlation")
    );
}

#[test]
fn long_history_embeds_passing_backtest() {
    // Calibrated series: mostly small moves with occasional 95%-tail losses
    // evenly spread, so the Kupiec and Christoffersen tests both pass.
    let returns: Vec<f64> = (0..500)
        .map(|i| if i % 20 == 7 { -0.045 } else { 0.0005 })
        .collect();
    let portfolio = Portfolio::new(
        vec![
            Position::new(AssetId::new("SPY"), 1.0, 100.0)
                .with_volatility(0.02)
                .with_history(history_from_returns(&returns)),
        ],
        "USD",
        0,
    );
    let model = PortfolioModel::build(&portfolio).unwrap();

    let var = ValueAtRiskEngine::new(0.95, 1)
        .unwrap()
        .parametric(&model)
        .unwrap();
    let backtest = var.backtest.expect("500 observations should embed a backtest");
    assert_eq!(backtest.observations, 500);
    assert_eq!(backtest.violations, 25);
    assert!(!backtest.kupiec.reject);
    assert!(!backtest.christoffersen.reject);
}

#[test]
fn sharpe_requires_minimum_history_and_finite_volatility() {
    let calculator = RiskCalculator::new(0.0);
    // Too few observations.
    assert_eq!(calculator.sharpe_ratio(&[0.01; 10]), 0.0);
    // Constant returns have zero volatility.
    assert_eq!(calculator.sharpe_ratio(&[0.01; 40]), 0.0);

    // A real series produces a finite, positive ratio.
    let returns: Vec<f64> = (0..60)
        .map(|i| 0.001 + 0.01 * (i as f64 * 0.7).sin())
        .collect();
    let sharpe = calculator.sharpe_ratio(&returns);
    assert!(sharpe.is_finite() && sharpe > 0.0);
}
