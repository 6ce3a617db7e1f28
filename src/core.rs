use crate::bgg::{self, PageIterator, Session, Step, Unauthorized};
use crate::export;
use crate::stats;
use crate::{GameId, RankedGameRow};
use chrono::Local;
use failure::{Error, ResultExt, ensure};
use serde_derive::{Serialize, Deserialize};
use serde_json::{from_str, to_string_pretty};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "app.config";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub total_games: u32, // used when --total-games is not given
    pub batch_size: usize, // ids per XML API request
    pub page_delay_ms: u64, // between browse pages
    pub batch_delay_ms: u64, // between XML API batches
    pub token_file: String,
    pub user_agent: String,
    pub browse_url: String, // `{page}` is replaced by the page number
    pub stats_url: String // `{ids}` is replaced by comma separated ids
}

impl Default for Config {
    fn default() -> Config {
        Config {
            total_games: 20,
            batch_size: 10,
            page_delay_ms: 2000,
            batch_delay_ms: 10000,
            token_file: String::from("bgg_token.txt"),
            user_agent: String::from("bgg_dump/0.1 (ranked board game export)"),
            browse_url: String::from("https://boardgamegeek.com/browse/boardgame/page/{page}"),
            stats_url: String::from("https://boardgamegeek.com/xmlapi/boardgame/{ids}?stats=1")
        }
    }
}

impl Config {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

/// Reads the config file, falling back to defaults when there is none.
pub fn config(path: &Path) -> Result<Config, Error> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let conf = fs::read_to_string(path)
        .with_context(|_| format!("Can't open: {}", path.display()))?;
    let conf: Config = from_str(&conf)
        .with_context(|_| format!("Can't parse: {}", path.display()))?;
    ensure!(conf.batch_size > 0, "batch_size must be positive in {}", path.display());
    Ok(conf)
}

pub fn create_config(path: &Path) -> Result<(), Error> {
    let new_conf = to_string_pretty(&Config::default())?;
    fs::write(path, new_conf)?;
    Ok(())
}

/// Bearer token for the XML API. No token, no run.
pub fn load_token(path: &Path) -> Result<String, Error> {
    let token = fs::read_to_string(path)
        .with_context(|_| format!("Can't read API token from {}", path.display()))?;
    let token = token.trim();
    ensure!(!token.is_empty(), "API token file {} is empty", path.display());
    Ok(token.to_string())
}

#[derive(Debug)]
pub enum Message {
    NotePage(u32, usize), // page number, ids collected so far
    NoteBatch(usize, usize), // batch number, number of batches
    NoteErr(Error),
    NoteMissing(GameId)
}

fn is_fatal(e: &Error) -> bool {
    e.downcast_ref::<Unauthorized>().is_some()
}

/// Top `total` game ids in rank order. Fewer come back when BGG runs
/// out of ranked games or a browse page can't be read.
pub fn collect_ids(config: &Config, session: &mut Session, total: u32,
        mut progress: impl FnMut(Message)) -> Result<Vec<GameId>, Error> {
    ensure!(total > 0, "Can't get top.");

    let total = total as usize;
    let mut ids: Vec<GameId> = Vec::with_capacity(total);
    let mut pages = PageIterator::new(session, &config.browse_url, config.page_delay());
    while let Some(page) = pages.next() {
        let page = match page {
            Ok(page) => page,
            Err(e) => {
                if is_fatal(&e) {
                    return Err(e);
                }
                progress(Message::NoteErr(e));
                break;
            }
        };
        let before = ids.len();
        for id in page {
            if !ids.contains(&id) {
                ids.push(id);
            }
            if ids.len() >= total {
                break;
            }
        }
        progress(Message::NotePage(pages.page(), ids.len()));
        if ids.len() >= total || ids.len() == before {
            break;
        }
    }
    Ok(ids)
}

/// One XML API request and the ids it covers.
#[derive(Debug, PartialEq)]
pub struct Batch<'a> {
    pub step: Step,
    pub first_rank: u32,
    pub ids: &'a [GameId]
}

pub fn plan_batches<'a>(config: &Config, ids: &'a [GameId]) -> Vec<Batch<'a>> {
    ids.chunks(config.batch_size.max(1))
        .enumerate()
        .map(|(i, chunk)| Batch {
            step: Step::new(bgg::stats_url(&config.stats_url, chunk), config.batch_delay()),
            first_rank: (i * config.batch_size.max(1)) as u32 + 1,
            ids: chunk
        })
        .collect()
}

/// Rows for `ids`, ranked by their position. Ids of a failed batch and
/// ids missing from a returned document are left out.
pub fn fetch_stats(config: &Config, session: &mut Session, ids: &[GameId],
        mut progress: impl FnMut(Message)) -> Result<Vec<RankedGameRow>, Error> {
    let batches = plan_batches(config, ids);
    let mut rows = Vec::with_capacity(ids.len());
    for (i, batch) in batches.iter().enumerate() {
        progress(Message::NoteBatch(i + 1, batches.len()));
        let body = match session.request(&batch.step) {
            Ok(body) => body,
            Err(e) => {
                if is_fatal(&e) {
                    return Err(e);
                }
                progress(Message::NoteErr(e));
                continue;
            }
        };
        let mut games = stats::parse_batch(&body);
        for (offset, id) in batch.ids.iter().enumerate() {
            match games.iter().position(|g| g.id == *id) {
                Some(pos) => {
                    let game = games.swap_remove(pos);
                    rows.push(RankedGameRow::new(batch.first_rank + offset as u32, game));
                },
                None => progress(Message::NoteMissing(*id))
            }
        }
    }
    Ok(rows)
}

#[derive(Debug)]
pub struct Dump {
    pub total: u32,
    pub file_name: String,
    pub rows: Vec<RankedGameRow>
}

/// Collects ids, then their statistics. Nothing is written here.
pub fn run(config: &Config, session: &mut Session, total: u32,
        mut progress: impl FnMut(Message)) -> Result<Dump, Error> {
    let ids = collect_ids(config, session, total, &mut progress)?;
    let rows = fetch_stats(config, session, &ids, &mut progress)?;
    let file_name = export::file_name(total, &Local::now());
    Ok(Dump { total, file_name, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn scratch(name: &str) -> std::path::PathBuf {
        env::temp_dir().join(format!("bgg_dump_{}_{}", std::process::id(), name))
    }

    #[test]
    fn missing_config_gives_defaults() {
        let conf = config(&scratch("no.config")).unwrap();
        assert_eq!(conf, Config::default());
        assert_eq!(conf.page_delay(), Duration::from_secs(2));
        assert_eq!(conf.batch_delay(), Duration::from_secs(10));
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let path = scratch("partial.config");
        fs::write(&path, r#"{ "batch_size": 2, "page_delay_ms": 5 }"#).unwrap();
        let conf = config(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(conf.batch_size, 2);
        assert_eq!(conf.page_delay(), Duration::from_millis(5));
        assert_eq!(conf.total_games, 20);
        assert_eq!(conf.batch_delay_ms, 10000);
    }

    #[test]
    fn created_config_reads_back() {
        let path = scratch("created.config");
        create_config(&path).unwrap();
        let conf = config(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(conf, Config::default());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let path = scratch("zero.config");
        fs::write(&path, r#"{ "batch_size": 0 }"#).unwrap();
        let conf = config(&path);
        fs::remove_file(&path).unwrap();
        assert!(conf.is_err());
    }

    #[test]
    fn token_is_trimmed() {
        let path = scratch("token.txt");
        fs::write(&path, "  abc123\n").unwrap();
        let token = load_token(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(token, "abc123");
    }

    #[test]
    fn missing_or_empty_token_is_fatal() {
        assert!(load_token(&scratch("absent_token.txt")).is_err());
        let path = scratch("empty_token.txt");
        fs::write(&path, "\n  \n").unwrap();
        let token = load_token(&path);
        fs::remove_file(&path).unwrap();
        assert!(token.is_err());
    }

    #[test]
    fn batches_cover_ids_in_order() {
        let conf = Config {
            batch_size: 2,
            stats_url: String::from("https://bgg.test/xml/{ids}"),
            ..Config::default()
        };
        let ids = [5, 6, 7, 8, 9];
        let batches = plan_batches(&conf, &ids);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].step.url, "https://bgg.test/xml/5,6");
        assert_eq!(batches[1].first_rank, 3);
        assert_eq!(batches[1].ids, &[7, 8]);
        assert_eq!(batches[2].first_rank, 5);
        assert_eq!(batches[2].ids, &[9]);
        assert!(batches.iter().all(|b| b.step.delay_after == Duration::from_secs(10)));
    }
}
