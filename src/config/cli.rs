use crate::config::toml_config::TomlConfig;
use crate::domain::model::Id;
use crate::utils::error::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Parser)]
#[command(name = "famcal")]
#[command(about = "Turn school emails and flyers into family calendar events")]
pub struct CliConfig {
    #[arg(long, global = true, help = "Path to a TOML configuration file")]
    pub config: Option<String>,

    #[arg(long, global = true, default_value = "1")]
    pub user_id: Id,

    #[arg(long, global = true, help = "Overrides [store].data_dir")]
    pub data_dir: Option<String>,

    #[arg(long, global = true, help = "Use rule-based extraction only")]
    pub offline: bool,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Analyze an email body, a text file or a photographed flyer
    Analyze {
        #[arg(long, conflicts_with = "text")]
        file: Option<String>,

        #[arg(long)]
        text: Option<String>,

        #[arg(long, help = "Treat the input as HTML")]
        html: bool,

        #[arg(long, help = "Image of a flyer (png, jpg, gif, webp)")]
        image: Option<String>,

        #[arg(long, help = "Reference date for relative phrases (YYYY-MM-DD)")]
        today: Option<NaiveDate>,
    },

    /// Print a 6-week month grid with stored events
    Grid { year: i32, month: u32 },

    /// List stored events overlapping a time window
    Conflicts {
        date: NaiveDate,

        #[arg(long, help = "Start time, e.g. 09:00 or 9:00 AM")]
        start: String,

        #[arg(long)]
        end: Option<String>,

        #[arg(long, help = "Event id to ignore (when editing it)")]
        exclude: Option<Id>,
    },

    /// Manage children known to the local store
    Children {
        #[command(subcommand)]
        action: ChildrenCommand,
    },

    /// List or delete stored events
    Events {
        #[command(subcommand)]
        action: EventsCommand,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum ChildrenCommand {
    Add { name: String },
    List,
}

#[derive(Debug, Clone, Subcommand)]
pub enum EventsCommand {
    List {
        #[arg(long)]
        from: Option<NaiveDate>,

        #[arg(long)]
        to: Option<NaiveDate>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    Delete { id: Id },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl CliConfig {
    /// 載入 TOML（沒有指定時用預設值），再套用命令列覆寫
    pub fn load_settings(&self) -> Result<TomlConfig> {
        let mut settings = match &self.config {
            Some(path) => TomlConfig::from_file(path)?,
            None => TomlConfig::default(),
        };

        if let Some(data_dir) = &self.data_dir {
            settings.store.data_dir = data_dir.clone();
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::ConfigProvider;

    #[test]
    fn test_parse_analyze_with_global_flags() {
        let cli = CliConfig::parse_from([
            "famcal",
            "analyze",
            "--text",
            "Soccer practice Saturday",
            "--offline",
            "--user-id",
            "7",
            "--today",
            "2025-03-15",
        ]);

        assert!(cli.offline);
        assert_eq!(cli.user_id, 7);
        match cli.command {
            Command::Analyze { text, today, .. } => {
                assert_eq!(text.as_deref(), Some("Soccer practice Saturday"));
                assert_eq!(today, NaiveDate::from_ymd_opt(2025, 3, 15));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_events_list_csv_format() {
        let cli = CliConfig::parse_from(["famcal", "events", "list", "--format", "csv"]);
        assert!(matches!(
            cli.command,
            Command::Events {
                action: EventsCommand::List {
                    format: OutputFormat::Csv,
                    ..
                }
            }
        ));
    }

    #[test]
    fn test_data_dir_override() {
        let cli = CliConfig::parse_from(["famcal", "--data-dir", "/tmp/other", "children", "list"]);
        let settings = cli.load_settings().unwrap();
        assert_eq!(settings.data_dir(), "/tmp/other");
    }
}
