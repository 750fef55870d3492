use chrono::Datelike;
use clap::Parser;
use famcal::adapters::csv_export::write_events_csv;
use famcal::config::{ChildrenCommand, Command, EventsCommand, OutputFormat};
use famcal::core::conflicts::find_conflicts_in_store;
use famcal::core::extractor::normalize_time;
use famcal::domain::model::{
    AnalyzeResult, EventFilter, Id, ImagePayload, PersistedEvent, RawContent, RequestContext,
};
use famcal::domain::ports::{ConfigProvider, EventClassifier, RecordStore};
use famcal::utils::error::{ErrorSeverity, IngestError};
use famcal::utils::{logger, validation::Validate};
use famcal::{
    build_month_grid, CliConfig, ContentPipeline, FallbackClassifier, HttpOracle, IngestEngine,
    JsonRecordStore, LocalStorage, MonthView, OracleClassifier, PipelineOptions,
    RuleBasedClassifier, TimeInterval, TomlConfig,
};
use std::io::Read;
use std::path::Path;

type Store = JsonRecordStore<LocalStorage>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let settings = match cli.load_settings().and_then(|settings| {
        settings.validate()?;
        Ok(settings)
    }) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Configuration validation failed: {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    // 初始化日誌
    if settings.json_logs() {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting famcal CLI");
    tracing::debug!("CLI config: {:?}", cli);
    if settings.monitoring_enabled() {
        tracing::info!("🔍 Monitoring enabled for '{}'", settings.app.name);
    }

    let store = JsonRecordStore::new(LocalStorage::new(settings.data_dir()));

    if let Err(e) = run(&cli, &settings, store).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };

        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(cli: &CliConfig, settings: &TomlConfig, store: Store) -> famcal::Result<()> {
    match &cli.command {
        Command::Analyze {
            file,
            text,
            html,
            image,
            today,
        } => {
            let content = read_content(file.as_deref(), text.as_deref(), *html, image.as_deref()).await?;
            let mut options = PipelineOptions::from_config(settings);
            if let Some(today) = today {
                options = options.with_reference_date(*today);
            }
            let result = analyze(cli, settings, store, options, &content).await?;
            print_analysis(&result)
        }
        Command::Grid { year, month } => print_grid(&store, cli.user_id, *year, *month).await,
        Command::Conflicts {
            date,
            start,
            end,
            exclude,
        } => {
            let start = parse_clock("start", start)?;
            let end = end.as_deref().map(|e| parse_clock("end", e)).transpose()?;
            let interval = TimeInterval::new(date.and_time(start), end.map(|e| date.and_time(e)))?;

            let found = find_conflicts_in_store(&store, cli.user_id, &interval, *exclude).await?;
            if found.is_empty() {
                println!("✅ No conflicts between {} and {}", interval.start, interval.end);
            } else {
                println!("⏰ {} conflicting event(s):", found.len());
                print_event_table(&found);
            }
            Ok(())
        }
        Command::Children { action } => match action {
            ChildrenCommand::Add { name } => {
                let child = store.create_child(cli.user_id, name).await?;
                println!("👤 Added child #{} {}", child.id, child.name);
                Ok(())
            }
            ChildrenCommand::List => {
                let children = store.find_children(cli.user_id).await?;
                if children.is_empty() {
                    println!("No children on record for user {}", cli.user_id);
                }
                for child in children {
                    println!("{:>4}  {}", child.id, child.name);
                }
                Ok(())
            }
        },
        Command::Events { action } => match action {
            EventsCommand::List { from, to, format } => {
                let mut filter = EventFilter::owned_by(cli.user_id);
                if from.is_some() || to.is_some() {
                    filter = filter.between(
                        from.unwrap_or(chrono::NaiveDate::MIN),
                        to.unwrap_or(chrono::NaiveDate::MAX),
                    );
                }
                let events = store.find_events(&filter).await?;
                match format {
                    OutputFormat::Table => print_event_table(&events),
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&events)?),
                    OutputFormat::Csv => write_events_csv(&events, std::io::stdout().lock())?,
                }
                Ok(())
            }
            EventsCommand::Delete { id } => {
                if store.delete_event(cli.user_id, *id).await? {
                    println!("🗑️ Deleted event #{}", id);
                } else {
                    println!("No event #{} for user {}", id, cli.user_id);
                }
                Ok(())
            }
        },
    }
}

async fn analyze(
    cli: &CliConfig,
    settings: &TomlConfig,
    store: Store,
    options: PipelineOptions,
    content: &RawContent,
) -> famcal::Result<AnalyzeResult> {
    let ctx = RequestContext::new(cli.user_id, store.find_children(cli.user_id).await?);

    if cli.offline || !settings.has_oracle_credentials() {
        if !cli.offline {
            tracing::warn!("⚠️ No oracle api_key configured, using rule-based extraction");
        }
        return run_engine(store, RuleBasedClassifier::new(), options, &ctx, content).await;
    }

    let oracle = OracleClassifier::new(HttpOracle::from_config(settings.oracle())?);
    if settings.fallback_to_rules() {
        let classifier = FallbackClassifier::new(oracle, RuleBasedClassifier::new());
        run_engine(store, classifier, options, &ctx, content).await
    } else {
        run_engine(store, oracle, options, &ctx, content).await
    }
}

async fn run_engine<C: EventClassifier>(
    store: Store,
    classifier: C,
    options: PipelineOptions,
    ctx: &RequestContext,
    content: &RawContent,
) -> famcal::Result<AnalyzeResult> {
    let engine = IngestEngine::new(ContentPipeline::new(store, classifier, options));
    engine.run(ctx, content).await
}

async fn read_content(
    file: Option<&str>,
    text: Option<&str>,
    html: bool,
    image: Option<&str>,
) -> famcal::Result<RawContent> {
    let body = match (text, file) {
        (Some(text), _) => text.to_string(),
        (None, Some(path)) => tokio::fs::read_to_string(path).await?,
        (None, None) if image.is_some() => String::new(),
        (None, None) => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    if let Some(path) = image {
        let bytes = tokio::fs::read(path).await?;
        let mime_type = image_mime_type(path)?;
        return Ok(RawContent::photo(Some(ImagePayload { bytes, mime_type }), body));
    }

    // .html/.htm 檔案即使沒加 --html 也當成 HTML
    let html = html
        || file
            .and_then(|path| Path::new(path).extension())
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
            .unwrap_or(false);

    Ok(if html {
        RawContent::html(body)
    } else {
        RawContent::text(body)
    })
}

fn image_mime_type(path: &str) -> famcal::Result<String> {
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let mime = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        other => {
            return Err(IngestError::ValidationError {
                message: format!("unsupported image type '{}'", other),
            })
        }
    };
    Ok(mime.to_string())
}

fn parse_clock(field: &str, raw: &str) -> famcal::Result<chrono::NaiveTime> {
    normalize_time(raw).ok_or_else(|| IngestError::ValidationError {
        message: format!("invalid {} time '{}'", field, raw),
    })
}

fn print_analysis(result: &AnalyzeResult) -> famcal::Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    println!(
        "✅ {} created, {} skipped as duplicates, {} error(s)",
        result.events_created,
        result.skipped,
        result.errors.len()
    );
    for conflict in &result.conflicts {
        println!(
            "⏰ Event #{} overlaps {:?}",
            conflict.event_id, conflict.conflicting_event_ids
        );
    }
    Ok(())
}

fn print_event_table(events: &[PersistedEvent]) {
    for record in events {
        let event = &record.event;
        let when = match (event.start_time_label(), event.end_time_label()) {
            (Some(start), Some(end)) => format!("{}-{}", start, end),
            (Some(start), None) => start,
            _ => "all day".to_string(),
        };
        println!(
            "{:>4}  {}  {:<11}  {:<16}  {}",
            record.id,
            event.start_date.format("%Y-%m-%d"),
            when,
            event.category,
            event.title
        );
    }
}

async fn print_grid(store: &Store, user_id: Id, year: i32, month: u32) -> famcal::Result<()> {
    let grid = build_month_grid(year, month)?;
    let (from, to) = grid.range();
    let events = store
        .find_events(&EventFilter::owned_by(user_id).between(from, to))
        .await?;
    let view = MonthView::new(&grid, &events);

    if let Some(first) = grid.cells.iter().find(|c| c.is_current_month) {
        println!("{:^28}", first.date.format("%B %Y").to_string());
    }
    println!(" Su  Mo  Tu  We  Th  Fr  Sa");
    for week in view.weeks() {
        let line: String = week
            .iter()
            .map(|day| {
                // 非本月的日期用括號，有事件的日期加星號
                let label = day.cell.date.day();
                if !day.cell.is_current_month {
                    format!("({:>2})", label)
                } else if day.events.is_empty() {
                    format!(" {:>2} ", label)
                } else {
                    format!(" {:>2}*", label)
                }
            })
            .collect();
        println!("{}", line);
    }

    for day in view.days.iter().filter(|d| d.cell.is_current_month && !d.events.is_empty()) {
        for record in &day.events {
            println!(
                "{}  {}  {}",
                day.cell.date.format("%m-%d"),
                record.event.start_time_label().unwrap_or_else(|| "--:--".to_string()),
                record.event.title
            );
        }
    }
    Ok(())
}
