use bgg_dump::core::CONFIG_FILE_NAME;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
/// Dumps the top of the bgg board game ranking
/// with per game statistics into a csv file.
pub struct Cli {
    #[structopt(long = "total-games")]
    /// Number of ranked games to dump. Takes the
    /// value from config file when omitted (20 by default).
    pub total_games: Option<u32>,
    #[structopt(long = "config", parse(from_os_str))]
    /// Config file with delays, batch size and token file location.
    /// Defaults to app.config.
    pub config: Option<PathBuf>,
    #[structopt(long = "new-config")]
    /// Writes a config file with default values and exits.
    pub new_config: bool
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_app_config() {
        let cli = Cli::from_iter(&["bgg_dump", "--total-games", "5"]);
        assert_eq!(cli.total_games, Some(5));
        assert_eq!(cli.config_path(), PathBuf::from(CONFIG_FILE_NAME));
        assert_eq!(CONFIG_FILE_NAME, "app.config");
    }

    #[test]
    fn config_can_be_overridden() {
        let cli = Cli::from_iter(&["bgg_dump", "--config", "other.json"]);
        assert_eq!(cli.total_games, None);
        assert_eq!(cli.config_path(), PathBuf::from("other.json"));
    }
}
