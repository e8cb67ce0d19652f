// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

use covenant_enforcement::money::format_money;
use covenant_enforcement::{
    Credit, CureTrack, Database, EnforcementConfig, EnforcementEngine, ParcelField, ParcelStatus,
    ParcelStore, SurveyedArea, TransitionContext,
};

#[derive(Parser)]
#[command(name = "covenant-enforcement", version, about = "Security-fee covenant enforcement for the Kirby Gate campus")]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "ENFORCEMENT_DB", default_value = "enforcement.db", global = true)]
    db: PathBuf,

    /// JSON config file (defaults to the built-in campus constants)
    #[arg(long, env = "ENFORCEMENT_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Compute as of this date (YYYY-MM-DD) instead of today
    #[arg(long, global = true)]
    as_of: Option<NaiveDate>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and load the campus parcels
    Init,
    /// List parcels with computed arrears
    List {
        #[arg(long)]
        status: Option<ParcelStatus>,
    },
    /// Show one parcel in full
    View { id: i64 },
    /// Arrears breakdown by rate period
    Arrears {
        id: i64,
        /// Explicit window length in weeks instead of the delinquency start
        #[arg(long)]
        weeks: Option<u32>,
    },
    /// Delinquent parcels by urgency
    Rank,
    /// Cure, lien and attorney deadlines for every packet sent
    Deadlines,
    /// Settlement floors per tier, and a payment plan
    Quote {
        id: i64,
        /// Tier to build a payment plan for
        #[arg(long)]
        tier: Option<String>,
        /// Annual simple interest, percent
        #[arg(long, default_value_t = 2.0)]
        interest: f64,
        #[arg(long, default_value_t = 12)]
        months: u32,
    },
    /// Change a parcel's status
    Transition {
        id: i64,
        status: ParcelStatus,
        /// Settlement amount (required for SETTLED)
        #[arg(long)]
        amount: Option<f64>,
        /// Validate the settlement against this tier instead of the policy floor
        #[arg(long)]
        tier: Option<String>,
        /// Accrual start when moving to DELINQUENT
        #[arg(long)]
        since: Option<NaiveDate>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Record a demand packet as sent and derive its deadlines
    PacketSent {
        id: i64,
        date: NaiveDate,
        #[arg(long)]
        tracking: Option<String>,
        /// Use the Declaration cure period instead of the demand-letter one
        #[arg(long)]
        declaration: bool,
    },
    /// Record a payment or credit
    Credit {
        id: i64,
        amount: f64,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value = "")]
        memo: String,
    },
    /// Edit one operator field
    Set {
        id: i64,
        field: ParcelField,
        value: String,
    },
    /// Show the enforcement log, or record an action when one is given
    Log {
        id: Option<i64>,
        #[arg(long)]
        action: Option<String>,
        #[arg(long)]
        via: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Lender / title research progress, or one parcel's research detail
    Lenders { id: Option<i64> },
    /// Apply re-surveyed square footage; the campus total must still balance
    Resurvey {
        /// ID=SQFT pairs, e.g. 10=125760 19=45200
        #[arg(required = true)]
        areas: Vec<SurveyedArea>,
    },
    /// One-time copy of an unversioned tracker database into a fresh one
    ImportLegacy { path: PathBuf },
    /// Write parcels.csv and enforcement_log.csv
    Export {
        #[arg(default_value = "export")]
        dir: PathBuf,
    },
    /// Data-integrity checks
    Check {
        /// Also inspect an old tracker file (e.g. kirby_gate.db) for legacy layouts
        #[arg(long)]
        legacy: Option<PathBuf>,
    },
    /// Interactive dashboard
    Ui,
}

fn init_tracing() {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if !matches!(cli.cmd, Commands::Ui) {
        init_tracing();
    }

    let config = EnforcementConfig::load(cli.config.as_deref())?;
    let as_of = cli
        .as_of
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    let mut db = Database::open(&cli.db)?;
    if let Commands::Init = cli.cmd {
        let inserted = db.seed(&config)?;
        if inserted == 0 {
            println!("Database {:?} already seeded", db.path());
        } else {
            println!("✓ Seeded {} parcels into {:?}", inserted, db.path());
        }
        return Ok(());
    }
    if let Commands::ImportLegacy { path } = &cli.cmd {
        let report = db.import_legacy(path)?;
        println!(
            "✓ Imported {} parcels and {} log entries from {:?}",
            report.parcels,
            report.log_entries,
            path
        );
        if report.skipped_log_entries > 0 {
            println!("  {} campus-wide or orphaned log entries skipped", report.skipped_log_entries);
        }
        for layout in &report.ignored_layouts {
            println!("  ⚠️  not imported: {}", layout);
        }
        println!("  Run `check` to confirm the campus square footage still balances.");
        return Ok(());
    }

    let engine = EnforcementEngine::for_store(config, &db)?;

    match cli.cmd {
        Commands::Init | Commands::ImportLegacy { .. } => {}
        Commands::List { status } => cmd_list(&engine, &db, status, as_of)?,
        Commands::View { id } => cmd_view(&engine, &db, id, as_of)?,
        Commands::Arrears { id, weeks } => cmd_arrears(&engine, &db, id, weeks, as_of)?,
        Commands::Rank => cmd_rank(&engine, &db, as_of)?,
        Commands::Deadlines => cmd_deadlines(&engine, &db, as_of)?,
        Commands::Quote {
            id,
            tier,
            interest,
            months,
        } => cmd_quote(&engine, &db, id, tier.as_deref(), interest, months, as_of)?,
        Commands::Transition {
            id,
            status,
            amount,
            tier,
            since,
            note,
        } => {
            let mut ctx = TransitionContext::new(as_of);
            ctx.settlement_amount = amount;
            ctx.settlement_tier = tier;
            ctx.delinquent_since = since;
            ctx.note = note;
            let entry = engine.transition(&mut db, id, status, &ctx)?;
            println!("✓ {}", entry.action);
        }
        Commands::PacketSent {
            id,
            date,
            tracking,
            declaration,
        } => {
            let track = declaration.then_some(CureTrack::Declaration);
            engine
                .machine()
                .record_packet_sent(&mut db, id, date, tracking.as_deref(), track)?;
            let parcel = db.parcel(id)?;
            println!("✓ Packet sent {} for {}", date, parcel.label());
            for (kind, due) in parcel.deadlines() {
                println!("    {:<12} {}", kind.as_str(), due);
            }
        }
        Commands::Credit { id, amount, date, memo } => {
            let credit = Credit::new(id, date.unwrap_or(as_of), amount, &memo);
            let entry = engine.machine().record_credit(&mut db, &credit)?;
            println!("✓ {}", entry.action);
        }
        Commands::Set { id, field, value } => {
            let entry = engine.machine().update_field(&mut db, id, field, &value)?;
            println!("✓ {}", entry.action);
        }
        Commands::Log {
            id,
            action,
            via,
            notes,
        } => match (id, action) {
            (Some(id), Some(action)) => {
                let entry = engine
                    .machine()
                    .log_action(&mut db, id, &action, via.as_deref(), notes.as_deref())?;
                println!("✓ Logged '{}' for parcel {}", entry.action, id);
            }
            (id, None) => cmd_log(&db, id)?,
            (None, Some(_)) => anyhow::bail!("a parcel id is required to record an action"),
        },
        Commands::Export { dir } => {
            let parcels = db.parcels()?;
            let credits = db.credits(None)?;
            let figures = engine.all_figures(&parcels, &credits, as_of)?;
            let entries = db.log_entries(None)?;
            let written = covenant_enforcement::export::export_to_dir(&dir, &figures, &entries, &parcels)?;
            for path in written {
                println!("✓ Wrote {:?}", path);
            }
        }
        Commands::Lenders { id: Some(id) } => cmd_lender_detail(&db, id)?,
        Commands::Lenders { id: None } => cmd_lenders(&engine, &db)?,
        Commands::Resurvey { areas } => {
            for entry in engine.resurvey(&mut db, &areas)? {
                println!("✓ #{} {}", entry.parcel_id, entry.action);
            }
        }
        Commands::Check { legacy } => cmd_check(&engine, &db, legacy.as_deref())?,
        Commands::Ui => run_ui_mode(&engine, &db, as_of)?,
    }

    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let cut: String = text.chars().take(width.saturating_sub(2)).collect();
        format!("{}..", cut)
    }
}

fn cmd_list(engine: &EnforcementEngine, db: &Database, status: Option<ParcelStatus>, as_of: NaiveDate) -> Result<()> {
    let parcels: Vec<_> = db
        .parcels()?
        .into_iter()
        .filter(|p| status.map_or(true, |s| p.status == s))
        .collect();
    let credits = db.credits(None)?;
    let figures = engine.all_figures(&parcels, &credits, as_of)?;

    println!(
        "{:>3} {:<5} {:<30} {:>9} {:>8} {:>14} {:>11} {:<14}",
        "ID", "", "Business", "SF", "Share", "Arrears", "Weekly", "Deadlines"
    );
    println!("{}", "-".repeat(101));
    for (parcel, f) in parcels.iter().zip(&figures) {
        println!(
            "{:>3} {:<5} {:<30} {:>9} {:>7.3}% {:>14} {:>11} {:<14}",
            f.parcel_id,
            parcel.status.marker(),
            truncate(parcel.label(), 30),
            f.sqft,
            f.share * 100.0,
            format_money(f.arrears),
            format_money(f.weekly_pro_rata),
            f.deadline_status.as_str(),
        );
    }
    println!("{}", "-".repeat(101));
    let total: f64 = figures.iter().map(|f| f.arrears).sum();
    println!("{} parcels, arrears {} as of {}", figures.len(), format_money(total), as_of);
    Ok(())
}

fn cmd_view(engine: &EnforcementEngine, db: &Database, id: i64, as_of: NaiveDate) -> Result<()> {
    let parcel = db.parcel(id)?;
    let credits = db.credits(Some(id))?;
    let arrears = engine.compute_arrears(&parcel, &credits, as_of)?;
    let billing = engine.billing_comparison(&parcel, as_of)?;
    let status = engine.deadline_status(&parcel, &credits, as_of)?;

    let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "—".to_string());
    let date = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "—".to_string());

    println!("{} {} ({})", parcel.status.marker(), parcel.label(), parcel.address);
    println!("  Status:            {}", parcel.status);
    println!("  Step:              {}", parcel.enforcement_step);
    println!("  SF / share:        {} SF / {:.4}%", parcel.sqft, arrears.share * 100.0);
    println!("  Entity owner:      {}", parcel.entity_owner);
    println!("  Corporate target:  {}", parcel.corporate_target);
    println!("  Arrears:           {} ({:?})", format_money(arrears.amount), arrears.basis);
    println!(
        "  Weekly pro-rata:   {} (billed {})",
        format_money(billing.pro_rata_weekly),
        format_money(billing.billed_weekly)
    );
    println!("  Packet sent:       {}", date(parcel.packet_sent));
    println!("  Tracking:          {}", opt(&parcel.certified_mail_tracking));
    println!("  Cure deadline:     {}", date(parcel.cure_deadline));
    println!("  Lien filing:       {}", date(parcel.lien_filing_date));
    println!("  Attorney referral: {}", date(parcel.attorney_referral_date));
    println!("  Next action:       {} (by {})", opt(&parcel.next_action), date(parcel.next_action_deadline));
    println!("  Deadline status:   {}", status);
    println!("  Notes:             {}", opt(&parcel.notes));

    let pending = engine.pending_actions(&parcel, &credits, as_of)?;
    if !pending.is_empty() {
        println!("\n  Pending:");
        for action in pending {
            println!("    ⚠️  {}", action.describe());
        }
    }

    let log = db.log_entries(Some(id))?;
    if !log.is_empty() {
        println!("\n  Log:");
        for entry in log {
            println!("    {}  {}", entry.timestamp.format("%Y-%m-%d %H:%M"), entry.action);
        }
    }
    Ok(())
}

fn cmd_arrears(engine: &EnforcementEngine, db: &Database, id: i64, weeks: Option<u32>, as_of: NaiveDate) -> Result<()> {
    let parcel = db.parcel(id)?;
    let credits = db.credits(Some(id))?;
    let arrears = match weeks {
        Some(w) => engine
            .calculator()
            .compute_for_window(&parcel, &credits, as_of, w)?,
        None => engine.compute_arrears(&parcel, &credits, as_of)?,
    };

    println!("{} as of {} ({:?})", parcel.label(), as_of, arrears.basis);
    for b in &arrears.breakdown {
        println!(
            "  from {}  {:>8.2} weeks x {:>10}  = {:>14}",
            b.effective_from,
            b.weeks,
            format_money(b.weekly_rate),
            format_money(b.amount)
        );
    }
    if arrears.time_barred_weeks > 0.0 {
        println!("  {:.1} weeks time-barred and excluded", arrears.time_barred_weeks);
    }
    println!("  Gross:   {:>14}", format_money(arrears.gross));
    println!("  Credits: {:>14}", format_money(arrears.credits));
    println!("  Owed:    {:>14}", format_money(arrears.amount));
    Ok(())
}

fn cmd_rank(engine: &EnforcementEngine, db: &Database, as_of: NaiveDate) -> Result<()> {
    let parcels = db.parcels()?;
    let credits = db.credits(None)?;
    let ranking = engine.rank_delinquent(&parcels, &credits, as_of)?;

    println!("{:>3} {:<30} {:<11} {:>14} {:>12}", "#", "Business", "Status", "Arrears", "Deadline");
    println!("{}", "-".repeat(74));
    for (i, r) in ranking.iter().enumerate() {
        println!(
            "{:>3} {:<30} {:<11} {:>14} {:>12}",
            i + 1,
            truncate(r.parcel.label(), 30),
            r.parcel.status.as_str(),
            format_money(r.arrears),
            r.nearest_deadline.to_string(),
        );
    }
    Ok(())
}

fn cmd_deadlines(engine: &EnforcementEngine, db: &Database, as_of: NaiveDate) -> Result<()> {
    let parcels = db.parcels()?;
    let board = engine.machine().deadline_board(&parcels, as_of);

    if board.is_empty() {
        println!("No packets have been marked as sent yet.");
        return Ok(());
    }

    println!("{:<12} {:>6} {:<12} {:<28} {:<24}", "Date", "Days", "Type", "Business", "Tracking #");
    println!("{}", "-".repeat(92));
    for d in &board {
        println!(
            "{:<12} {:>5}d {:<12} {:<28} {:<24} {}",
            d.date.to_string(),
            d.days_left,
            d.kind.as_str(),
            truncate(&d.business_name, 28),
            truncate(d.tracking.as_deref().unwrap_or(""), 24),
            d.bucket.as_str()
        );
    }
    Ok(())
}

fn cmd_quote(
    engine: &EnforcementEngine,
    db: &Database,
    id: i64,
    tier: Option<&str>,
    interest_pct: f64,
    months: u32,
    as_of: NaiveDate,
) -> Result<()> {
    let parcel = db.parcel(id)?;
    let credits = db.credits(Some(id))?;
    let owed = engine.compute_arrears(&parcel, &credits, as_of)?.amount;

    println!("{}: arrears {} as of {}", parcel.label(), format_money(owed), as_of);
    for quote in engine.settlement().quote_all(owed) {
        println!(
            "  {:<22} {:>5.1}% off  minimum {:>14}",
            quote.tier,
            quote.discount * 100.0,
            format_money(quote.minimum)
        );
    }

    if let Some(name) = tier {
        let quote = engine.propose_settlement(&parcel, &credits, name, as_of)?;
        let terms = engine
            .settlement()
            .payment_plan(owed, quote.discount, interest_pct / 100.0, months);
        println!("\n  Payment plan ({}, {:.1}% over {} months):", quote.tier, interest_pct, months);
        println!("    Settled amount:          {}", format_money(terms.settled_amount));
        println!("    Monthly (no interest):   {}", format_money(terms.monthly_no_interest));
        println!("    Total with interest:     {}", format_money(terms.total_with_interest));
        println!("    Monthly (with interest): {}", format_money(terms.monthly_with_interest));
        println!("    Savings vs full:         {}", format_money(terms.savings_vs_full));
        println!("    Litigation estimate:     {}", format_money(terms.litigation_estimate));
        println!("    Savings vs litigation:   {}", format_money(terms.savings_vs_litigation));
    }
    Ok(())
}

fn cmd_log(db: &Database, id: Option<i64>) -> Result<()> {
    let entries = db.log_entries(id)?;
    if entries.is_empty() {
        println!("No enforcement actions recorded.");
        return Ok(());
    }
    for e in entries {
        println!(
            "{}  #{:<3} {}{}",
            e.timestamp.format("%Y-%m-%d %H:%M"),
            e.parcel_id,
            e.action,
            e.resulting_status.map(|s| format!(" [{}]", s)).unwrap_or_default()
        );
    }
    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "YES"
    } else {
        "---"
    }
}

fn cmd_lenders(engine: &EnforcementEngine, db: &Database) -> Result<()> {
    let parcels = db.parcels()?;
    let research = engine.lender_research(&parcels);
    if research.total() == 0 {
        println!("No non-current parcels.");
        return Ok(());
    }

    println!(
        "{:>3} {:<28} {:>4} {:>4} {:<16} {:<30} {:<16}",
        "ID", "Business", "Addr", "Lndr", "County Parcel", "Lender", "DoT Ref"
    );
    println!("{}", "-".repeat(105));
    for p in &research.parcels {
        println!(
            "{:>3} {:<28} {:>4} {:>4} {:<16} {:<30} {:<16}",
            p.id,
            truncate(p.label(), 28),
            yes_no(p.address_verified),
            yes_no(p.lender_verified),
            truncate(p.county_parcel_id.as_deref().unwrap_or("—"), 16),
            truncate(p.lender_name.as_deref().unwrap_or("—"), 30),
            truncate(p.deed_of_trust_ref.as_deref().unwrap_or("—"), 16),
        );
    }
    println!("{}", "-".repeat(105));
    println!(
        "Address verified: {}/{}  |  Lender verified: {}/{}",
        research.address_verified,
        research.total(),
        research.lender_verified,
        research.total()
    );
    println!("Edit with `set <ID> lender_name <VALUE>`; mark with `set <ID> lender_verified yes`.");
    Ok(())
}

fn cmd_lender_detail(db: &Database, id: i64) -> Result<()> {
    let parcel = db.parcel(id)?;
    let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "— NOT SET".to_string());

    println!("PARCEL #{}: {}", parcel.id, parcel.label());
    println!("  Address:            {}", parcel.address);
    println!("  Mailing address:    {}", opt(&parcel.mailing_address));
    println!("  Entity/owner:       {}", parcel.entity_owner);
    println!("  Corporate target:   {}", parcel.corporate_target);
    println!("  County parcel ID:   {}", opt(&parcel.county_parcel_id));
    println!("  SF:                 {}", parcel.sqft);
    println!("  Address verified:   {}", if parcel.address_verified { "YES" } else { "NO" });
    println!();
    println!("  LENDER / BANKING");
    println!("  Lender name:        {}", opt(&parcel.lender_name));
    println!("  Lender address:     {}", opt(&parcel.lender_address));
    println!("  Lender contact:     {}", opt(&parcel.lender_contact));
    println!("  Loan number:        {}", opt(&parcel.loan_number));
    println!("  Deed of trust ref:  {}", opt(&parcel.deed_of_trust_ref));
    println!("  Title company:      {}", opt(&parcel.title_company));
    println!("  Lender verified:    {}", if parcel.lender_verified { "YES" } else { "NO" });
    Ok(())
}

fn cmd_check(engine: &EnforcementEngine, db: &Database, legacy_file: Option<&std::path::Path>) -> Result<()> {
    let parcels = db.parcels()?;
    let log = db.log_entries(None)?;
    let mut legacy = db.legacy_layouts()?;
    if let Some(path) = legacy_file {
        for layout in covenant_enforcement::db::legacy_layouts_at(path)? {
            legacy.push(format!("{} in {:?}", layout, path));
        }
    }
    let report = engine.integrity_checker().check(&parcels, &log, &legacy);

    for f in &report.findings {
        let scope = f.parcel_id.map(|id| format!("#{}", id)).unwrap_or_else(|| "campus".to_string());
        println!("[{:<8}] {:<8} {}", f.severity.as_str(), scope, f.message);
        println!("                    → {}", f.recommendation);
    }
    println!("{}", report.summary());

    report
        .into_result()
        .context("integrity check found critical problems")?;
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(engine: &EnforcementEngine, db: &Database, as_of: NaiveDate) -> Result<()> {
    let parcels = db.parcels()?;
    let credits = db.credits(None)?;
    let summary = engine.summary(&parcels, &credits, db.log_count()?, as_of)?;
    let ranking = engine.rank_delinquent(&parcels, &credits, as_of)?;
    let figures = engine.all_figures(&parcels, &credits, as_of)?;
    let board = engine.machine().deadline_board(&parcels, as_of);

    let mut app = ui::App::new(summary, ranking, figures, board);
    ui::run_ui(&mut app)?;
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_engine: &EnforcementEngine, _db: &Database, _as_of: NaiveDate) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the JSON API: cargo run --bin enforcement-server --features server");
    std::process::exit(1);
}
