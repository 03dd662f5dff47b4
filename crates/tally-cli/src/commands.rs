use anyhow::{bail, Context};
use colored::{ColoredString, Colorize};
use serde::Serialize;
use serde_json::json;
use tally_sdk::{
    Actor, CashVarianceAlert, CountRequest, EntryDraft, EntryQuery, JournalStore, LedgerEntry,
    LedgerError, PaymentLedger, RecordRequest, SdkError, Severity, TallyConfig,
    VerificationReport,
};
use tally_types::{format_minor_units, DrawerId};

use crate::cli::*;

type Ledger = PaymentLedger<JournalStore>;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => TallyConfig::load(path)?,
        None => TallyConfig::default(),
    };
    let format = cli.format;

    if let Command::Config = cli.command {
        return cmd_config(&config, format);
    }

    let ledger = PaymentLedger::open(&cli.journal, config)
        .with_context(|| format!("opening journal {}", cli.journal.display()))?;

    match cli.command {
        Command::Append(args) => cmd_append(&ledger, args, format),
        Command::Log(args) => cmd_log(&ledger, args, format),
        Command::Verify(args) => cmd_verify(&ledger, args, format),
        Command::Count(args) => cmd_count(&ledger, args, format),
        Command::Alerts(args) => cmd_alerts(&ledger, args, format),
        Command::Resolve(args) => cmd_resolve(&ledger, args, format),
        Command::Sweep => cmd_sweep(&ledger, format),
        Command::Config => Ok(()),
    }
}

fn cmd_append(ledger: &Ledger, args: AppendArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut draft = EntryDraft::new(args.venue, args.key, args.entry_type, args.amount, args.currency);
    draft.order_id = args.order;
    draft.staff_id = args.staff;
    draft.shift_id = args.shift;
    draft.payment_method = args.method;
    draft.description = args.description;
    draft.reference = args.reference;
    draft.corrects_entry_id = args.corrects;

    let outcome = ledger.record(RecordRequest::new(draft, actor(&args.actor)))?;
    if format == OutputFormat::Json {
        return print_json(&json!({ "replayed": outcome.replayed, "entry": outcome.entry }));
    }

    let mark = if outcome.replayed {
        "↺ Replayed".yellow().bold()
    } else {
        "✓ Recorded".green().bold()
    };
    println!("{mark} {}", entry_line(&outcome.entry));
    Ok(())
}

fn cmd_log(ledger: &Ledger, args: LogArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut query = EntryQuery::venue(args.venue).of_types(args.types).limit(args.limit);
    query.from_date = args.from;
    query.to_date = args.to;
    query.after_number = args.after;

    let entries = ledger.entries(&query)?;
    if format == OutputFormat::Json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No entries for {}.", args.venue);
    }
    for entry in &entries {
        println!("{}", entry_line(entry));
    }
    Ok(())
}

fn cmd_verify(ledger: &Ledger, args: VerifyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let venues = match args.venue {
        Some(venue) => vec![venue],
        None => ledger.venues()?,
    };

    let mut reports = Vec::with_capacity(venues.len());
    for venue in venues {
        let report = match ledger.verify(venue) {
            Ok(report) => report,
            Err(SdkError::Ledger(LedgerError::IntegrityViolation { .. })) => {
                ledger.inspect_chain(venue)?
            }
            Err(other) => return Err(other.into()),
        };
        reports.push(report);
    }
    let broken = reports.iter().filter(|r| !r.is_valid()).count();

    if format == OutputFormat::Json {
        let rendered: Vec<_> = reports.iter().map(report_json).collect();
        print_json(&rendered)?;
    } else {
        for report in &reports {
            print_report(report);
        }
    }

    if broken > 0 {
        bail!("{broken} venue chain(s) failed verification");
    }
    Ok(())
}

fn cmd_count(ledger: &Ledger, args: CountArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut request = CountRequest::new(args.key, args.venue, args.currency, args.actual);
    request.expected_cents = args.expected;
    request.shift_id = args.shift;
    request.business_date = args.date;
    request.staff_id = args.actor.acting;
    if let Some(label) = args.drawer {
        request.drawer_id = Some(DrawerId::new(label)?);
    }

    let outcome = ledger.count_drawer(request, &actor(&args.actor))?;
    if format == OutputFormat::Json {
        return print_json(&json!({ "replayed": outcome.replayed, "alert": outcome.alert }));
    }

    let alert = &outcome.alert;
    if outcome.replayed {
        println!("{} count already evaluated", "↺".yellow().bold());
    }
    println!("{}", alert_line(alert));
    println!(
        "  expected {}  counted {}  ({} cash of {} transactions)",
        format_minor_units(alert.expected_cents, alert.currency),
        format_minor_units(alert.actual_cents, alert.currency),
        alert.cash_transaction_count,
        alert.transaction_count,
    );
    if let Some(entry_id) = alert.ledger_entry_id {
        println!("  booked as entry {}", entry_id.short_id().cyan());
    }
    Ok(())
}

fn cmd_alerts(ledger: &Ledger, args: AlertsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let alerts = match args.venue {
        Some(venue) => ledger.alerts(venue, args.from, args.to)?,
        None => ledger.alert_feed(args.after, args.limit, args.min_severity)?,
    };
    if format == OutputFormat::Json {
        return print_json(&alerts);
    }
    if alerts.is_empty() {
        println!("No alerts.");
    }
    for alert in &alerts {
        println!("{}", alert_line(alert));
    }
    Ok(())
}

fn cmd_resolve(ledger: &Ledger, args: ResolveArgs, format: OutputFormat) -> anyhow::Result<()> {
    let alert = ledger.resolve_alert(args.alert, &actor(&args.actor), args.notes)?;
    if format == OutputFormat::Json {
        return print_json(&alert);
    }
    println!("{} {}", "✓ Resolved".green().bold(), alert_line(&alert));
    Ok(())
}

fn cmd_sweep(ledger: &Ledger, format: OutputFormat) -> anyhow::Result<()> {
    let purged = ledger.sweep_idempotency(&Actor::system())?;
    if format == OutputFormat::Json {
        return print_json(&json!({ "purged": purged }));
    }
    println!("{} Purged {} expired idempotency record(s).", "✓".green(), purged);
    Ok(())
}

fn cmd_config(config: &TallyConfig, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(config),
        OutputFormat::Text => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn actor(args: &ActorArgs) -> Actor {
    let actor = match (args.acting, args.manager) {
        (Some(id), true) => Actor::manager(id),
        (Some(id), false) => Actor::staff(id),
        (None, _) => Actor::system(),
    };
    match &args.terminal {
        Some(terminal) => actor.on_terminal(terminal.clone()),
        None => actor,
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn entry_line(entry: &LedgerEntry) -> String {
    let amount = format_minor_units(entry.amount_cents, entry.currency);
    let amount = if entry.amount_cents < 0 {
        amount.red()
    } else {
        amount.normal()
    };
    format!(
        "#{:<5} {} {} {:<14} {:>12}  {}",
        entry.entry_number,
        entry.short_hash().dimmed(),
        entry.business_date,
        entry.entry_type.to_string().cyan(),
        amount,
        entry.idempotency_key
    )
}

fn severity_label(severity: Severity) -> ColoredString {
    let label = format!("{:<8}", severity.as_str());
    match severity {
        Severity::Low => label.green(),
        Severity::Medium => label.yellow(),
        Severity::High => label.red(),
        Severity::Critical => label.red().bold(),
    }
}

fn alert_line(alert: &CashVarianceAlert) -> String {
    let status = if alert.is_resolved() {
        "resolved".green()
    } else {
        "open".normal()
    };
    format!(
        "[{}] {} {} {} {:>12}  {} ({})",
        alert.seq,
        severity_label(alert.severity),
        alert.venue_id,
        alert.business_date,
        format_minor_units(alert.variance_cents, alert.currency),
        alert.reason,
        status
    )
}

fn print_report(report: &VerificationReport) {
    if report.is_valid() {
        println!(
            "{} {}: {} entries, chain intact",
            "✓".green().bold(),
            report.venue,
            report.checked
        );
        return;
    }
    println!(
        "{} {}: {} of {} entries fail verification, appends halted",
        "✗".red().bold(),
        report.venue,
        report.violations.len(),
        report.checked
    );
    for violation in &report.violations {
        println!("  {} {}", violation.entry_id.short_id().yellow(), violation.description);
    }
}

fn report_json(report: &VerificationReport) -> serde_json::Value {
    json!({
        "venue": report.venue,
        "checked": report.checked,
        "valid": report.is_valid(),
        "violations": report
            .violations
            .iter()
            .map(|v| json!({
                "entry_id": v.entry_id,
                "entry_number": v.entry_number,
                "description": v.description,
            }))
            .collect::<Vec<_>>(),
    })
}
