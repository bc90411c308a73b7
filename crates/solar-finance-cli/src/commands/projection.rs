use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde_json::Value;

use solar_finance_core::projection::{
    self, BatteryCreditGate, DiscountScope, EngineConfig, LeaseTerms, ScenarioInput, State,
};
use solar_finance_core::{LoanCatalog, LoanProfile, LoanProfileId};

use crate::input;
use crate::output::csv_out;

pub const ANNUAL_CSV: &str = "annual_cash_flow.csv";
pub const MONTHLY_CSV: &str = "monthly_cash_flow.csv";

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StateArg {
    Ny,
    Nj,
}

impl From<StateArg> for State {
    fn from(arg: StateArg) -> Self {
        match arg {
            StateArg::Ny => State::NY,
            StateArg::Nj => State::NJ,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CreditGateArg {
    /// Battery and state credits only when incentives are not applied
    WhenNotApplied,
    /// Battery and state credits only when incentives are applied
    WhenApplied,
}

impl From<CreditGateArg> for BatteryCreditGate {
    fn from(arg: CreditGateArg) -> Self {
        match arg {
            CreditGateArg::WhenNotApplied => BatteryCreditGate::WhenNotApplied,
            CreditGateArg::WhenApplied => BatteryCreditGate::WhenApplied,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DiscountScopeArg {
    /// Discount the base cost only
    BaseOnly,
    /// Discount the base cost and the financed gross cost
    BaseAndGross,
}

impl From<DiscountScopeArg> for DiscountScope {
    fn from(arg: DiscountScopeArg) -> Self {
        match arg {
            DiscountScopeArg::BaseOnly => DiscountScope::BaseOnly,
            DiscountScopeArg::BaseAndGross => DiscountScope::BaseAndGross,
        }
    }
}

/// Scenario parameters shared by `project`, `compare` and `export`
#[derive(Args)]
pub struct ScenarioArgs {
    /// Path to a JSON or YAML scenario file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// System size in kW
    #[arg(long)]
    pub system_size: Option<Decimal>,

    /// Installed cost per watt
    #[arg(long)]
    pub cost_per_watt: Option<Decimal>,

    /// Battery add-on cost
    #[arg(long, default_value = "0")]
    pub battery_cost: Decimal,

    /// Roofing cost bundled with the project
    #[arg(long, default_value = "0")]
    pub roof_cost: Decimal,

    /// Current monthly electric bill
    #[arg(long)]
    pub monthly_bill: Option<Decimal>,

    /// State for state-level incentives
    #[arg(long, value_enum)]
    pub state: Option<StateArg>,

    /// The system is leased (no federal credit)
    #[arg(long)]
    pub lease_eligible: bool,

    /// Incentives are flagged as applied
    #[arg(long)]
    pub incentives_applied: bool,

    /// Keep incentives out of the cash-flow outlay
    #[arg(long)]
    pub exclude_incentives_from_cashflow: bool,

    /// Loan program by catalog id (see `sfp catalog`)
    #[arg(long)]
    pub loan_program: Option<usize>,

    /// Loan term in years (with --apr and --dealer-fee)
    #[arg(long)]
    pub term: Option<u32>,

    /// Loan APR in percent
    #[arg(long)]
    pub apr: Option<Decimal>,

    /// Dealer fee in percent
    #[arg(long)]
    pub dealer_fee: Option<Decimal>,

    /// Project discount in percent
    #[arg(long, default_value = "0")]
    pub discount: Decimal,

    /// Months with no loan payment at the start of the term
    #[arg(long, default_value_t = 0)]
    pub deferral_months: u32,

    /// Discount rate for NPV as a decimal
    #[arg(long, default_value = "0.05")]
    pub npv_rate: Decimal,

    /// Year-one monthly lease payment
    #[arg(long)]
    pub lease_payment: Option<Decimal>,

    /// Annual lease escalator as a decimal
    #[arg(long, default_value = "0.028")]
    pub lease_escalator: Decimal,

    /// Date of the first scheduled payment (YYYY-MM-DD)
    #[arg(long)]
    pub first_payment_date: Option<NaiveDate>,

    /// When battery and state credits are granted
    #[arg(long, value_enum)]
    pub battery_credit_gate: Option<CreditGateArg>,

    /// Which costs the project discount reduces
    #[arg(long, value_enum)]
    pub discount_scope: Option<DiscountScopeArg>,
}

/// Arguments for schedule export
#[derive(Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,

    /// Directory for the CSV files (created if missing)
    #[arg(long, default_value = ".")]
    pub out_dir: String,
}

pub fn run_project(
    args: ScenarioArgs,
    catalog: &LoanCatalog,
) -> Result<Value, Box<dyn std::error::Error>> {
    let scenario = read_scenario(args, catalog)?;
    let result = projection::compute(&scenario)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_compare(
    args: ScenarioArgs,
    catalog: &LoanCatalog,
) -> Result<Value, Box<dyn std::error::Error>> {
    let scenario = read_scenario(args, catalog)?;
    let result = projection::compare_loan_profiles(&scenario, catalog)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_export(
    args: ExportArgs,
    catalog: &LoanCatalog,
) -> Result<Value, Box<dyn std::error::Error>> {
    let scenario = read_scenario(args.scenario, catalog)?;
    export_schedules(&scenario, Path::new(&args.out_dir))
}

fn export_schedules(
    scenario: &ScenarioInput,
    out_dir: &Path,
) -> Result<Value, Box<dyn std::error::Error>> {
    let output = projection::compute(scenario)?;

    fs::create_dir_all(out_dir)
        .map_err(|e| format!("Failed to create '{}': {}", out_dir.display(), e))?;

    let annual = output.result.annual_rows();
    let monthly = output.result.monthly_rows();
    let annual_path = out_dir.join(ANNUAL_CSV);
    let monthly_path = out_dir.join(MONTHLY_CSV);
    csv_out::write_rows(&annual_path, &annual)?;
    csv_out::write_rows(&monthly_path, &monthly)?;
    tracing::debug!(
        annual_rows = annual.len(),
        monthly_rows = monthly.len(),
        "cash-flow schedules exported"
    );

    Ok(serde_json::json!({
        "result": {
            "annual_file": annual_path.display().to_string(),
            "annual_rows": annual.len(),
            "monthly_file": monthly_path.display().to_string(),
            "monthly_rows": monthly.len(),
        },
        "warnings": output.warnings,
    }))
}

/// `--input` file, then piped stdin, then individual flags.
fn read_scenario(
    args: ScenarioArgs,
    catalog: &LoanCatalog,
) -> Result<ScenarioInput, Box<dyn std::error::Error>> {
    if let Some(ref path) = args.input {
        let scenario = input::file::read_input(path)?;
        return require_catalog_profile(scenario, catalog);
    }
    if let Some(scenario) = input::stdin::read_stdin()? {
        return require_catalog_profile(scenario, catalog);
    }
    scenario_from_flags(args, catalog)
}

/// Scenarios read whole name their loan profile inline; it must still be
/// one of the catalog's programs.
fn require_catalog_profile(
    scenario: ScenarioInput,
    catalog: &LoanCatalog,
) -> Result<ScenarioInput, Box<dyn std::error::Error>> {
    let profile = scenario.loan_profile;
    match catalog.find(profile.term_years, profile.apr_percent, profile.dealer_fee_percent) {
        Some((id, _)) => {
            tracing::debug!(loan_profile_id = %id, "scenario loan profile found in catalog");
            Ok(scenario)
        }
        None => Err(format!(
            "Scenario loan profile {profile} is not in the loan catalog (see `sfp catalog`)"
        )
        .into()),
    }
}

fn scenario_from_flags(
    args: ScenarioArgs,
    catalog: &LoanCatalog,
) -> Result<ScenarioInput, Box<dyn std::error::Error>> {
    let system_size_kw = args
        .system_size
        .ok_or("--system-size is required (or provide --input)")?;
    let cost_per_watt = args
        .cost_per_watt
        .ok_or("--cost-per-watt is required (or provide --input)")?;
    let monthly_electric_bill = args
        .monthly_bill
        .ok_or("--monthly-bill is required (or provide --input)")?;
    let state = args
        .state
        .ok_or("--state is required (or provide --input)")?;
    let battery_credit_gate = args
        .battery_credit_gate
        .ok_or("--battery-credit-gate is required (or provide --input)")?;
    let discount_scope = args
        .discount_scope
        .ok_or("--discount-scope is required (or provide --input)")?;

    let loan_profile = select_profile(&args, catalog)?;

    Ok(ScenarioInput {
        system_size_kw,
        cost_per_watt,
        battery_cost: args.battery_cost,
        roof_cost: args.roof_cost,
        monthly_electric_bill,
        state: state.into(),
        lease_eligible: args.lease_eligible,
        incentives_applied: args.incentives_applied,
        include_incentives_in_cashflow: !args.exclude_incentives_from_cashflow,
        loan_profile,
        project_discount_percent: args.discount,
        deferral_months: args.deferral_months,
        discount_rate_for_npv: args.npv_rate,
        lease_terms: args.lease_payment.map(|base_monthly_payment| LeaseTerms {
            base_monthly_payment,
            annual_escalator: args.lease_escalator,
        }),
        first_payment_date: args.first_payment_date,
        config: EngineConfig {
            battery_credit_gate: battery_credit_gate.into(),
            discount_scope: discount_scope.into(),
        },
    })
}

/// Catalog profile by id, or by the exact `(term, apr, fee)` tuple.
fn select_profile(
    args: &ScenarioArgs,
    catalog: &LoanCatalog,
) -> Result<LoanProfile, Box<dyn std::error::Error>> {
    if let Some(id) = args.loan_program {
        return Ok(*catalog.require(LoanProfileId(id))?);
    }
    match (args.term, args.apr, args.dealer_fee) {
        (Some(term), Some(apr), Some(fee)) => catalog
            .find(term, apr, fee)
            .map(|(_, profile)| *profile)
            .ok_or_else(|| {
                format!(
                    "No loan program matches {} (see `sfp catalog`)",
                    LoanProfile::new(term, apr, fee)
                )
                .into()
            }),
        _ => Err("--loan-program or all of --term, --apr and --dealer-fee are required".into()),
    }
}
