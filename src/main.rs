mod cli;

use bgg_dump::bgg::{self, Session, Sleep};
use bgg_dump::core::{self, Message};
use bgg_dump::export;
use cli::Cli;
use exitfailure::ExitFailure;
use failure::{Error, ensure};
use reqwest::blocking::Client;
use std::io::{self, Write};
use std::path::Path;
use structopt::StructOpt;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

fn main() -> Result<(), ExitFailure> {
    let cli = Cli::from_args();
    if cli.new_config {
        let path = cli.config_path();
        core::create_config(&path)?;
        println!("Created {}.", path.display());
        return Ok(());
    }
    dump(&cli)?;
    Ok(())
}

fn dump(cli: &Cli) -> Result<(), Error> {
    let config = core::config(&cli.config_path())?;
    let total = cli.total_games.unwrap_or(config.total_games);
    ensure!(total > 0, "--total-games must be positive.");
    // credentials first, nothing goes over the wire without them
    let token = core::load_token(Path::new(&config.token_file))?;
    let client = Client::new();
    let mut sleep = Sleep;
    let mut session = Session::new(&client, &mut sleep, bgg::headers(&config.user_agent, &token));

    println!("Starting download of top {} games.", total);
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let mut errors: u32 = 0;
    let dump = core::run(&config, &mut session, total, |m| {
        let (color, line) = match m {
            Message::NotePage(page, seen) => (Color::Green, format!("Downloaded page {}, {} games so far.", page, seen)),
            Message::NoteBatch(i, n) => (Color::Green, format!("Asking BGG about batch {}/{}.", i, n)),
            Message::NoteMissing(id) => (Color::Yellow, format!("Game {} is missing from the answer, skipped.", id)),
            Message::NoteErr(e) => {
                errors += 1;
                (Color::Red, format!("{}", e))
            }
        };
        if let Err(e) = note(&mut stdout, color, &line) {
            eprintln!("Can't write progress: {}", e);
        }
    })?;
    println!("Made {} requests, {} errors.", session.requests(), errors);

    if dump.rows.is_empty() {
        println!("No data was collected; no CSV was written.");
    } else {
        export::write_csv(Path::new(&dump.file_name), &dump.rows)?;
        println!("Saved {} of {} games to {}.", dump.rows.len(), dump.total, dump.file_name);
    }
    Ok(())
}

fn note<W: WriteColor>(out: &mut W, color: Color, line: &str) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(color)))?;
    writeln!(out, "{}", line)?;
    out.reset()
}
