//! Turns XML API documents into `GameStats`.
//!
//! Both the old `xmlapi/boardgame` layout (`<boardgame objectid=..>` with
//! text elements) and the `xmlapi2/thing` layout (`<item id=..>` with
//! `value` attributes and `<link>` credits) are understood. Anything
//! missing or malformed becomes `None`, a record is never rejected for it.

use select::document::Document;
use select::node::Node;
use select::predicate::{Attr, Name, Predicate};
use std::str::FromStr;
use crate::{GameId, GameStats, PlayerRange, TypeRank};

/// Every record of a batch document, in document order.
pub fn parse_batch(xml: &str) -> Vec<GameStats> {
    let doc = Document::from(xml);
    doc.find(Name("boardgame").or(Name("item")))
        .filter_map(parse_game)
        .collect()
}

pub fn parse_game(game: Node) -> Option<GameStats> {
    let id = game.attr("objectid")
        .or_else(|| game.attr("id"))?
        .trim()
        .parse::<GameId>()
        .ok()?;
    let votes = player_votes(game);
    Some(GameStats {
        id,
        name: primary_name(game),
        year: number(game, "yearpublished"),
        rating: number(game, "average"),
        weight: number(game, "averageweight"),
        min_players: number(game, "minplayers"),
        max_players: number(game, "maxplayers"),
        age: number(game, "age"),
        community_age: community_age(game),
        designers: credits(game, "boardgamedesigner"),
        artists: credits(game, "boardgameartist"),
        categories: credits(game, "boardgamecategory"),
        recommended_players: recommended_players(&votes),
        best_players: best_players(&votes),
        playing_time_min: number(game, "minplaytime").or_else(|| number(game, "playingtime")),
        playing_time_max: number(game, "maxplaytime").or_else(|| number(game, "playingtime")),
        types: types(game)
    })
}

fn text_of(node: Node) -> Option<String> {
    let raw = match node.attr("value") {
        Some(v) => v.to_string(),
        None => node.text()
    };
    let raw = raw.trim();
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

fn number<T: FromStr>(game: Node, tag: &str) -> Option<T> {
    let node = game.find(Name(tag)).next()?;
    text_of(node)?.parse::<T>().ok()
}

fn primary_name(game: Node) -> String {
    game.find(Name("name").and(Attr("primary", "true")))
        .chain(game.find(Name("name").and(Attr("type", "primary"))))
        .chain(game.find(Name("name")))
        .filter_map(text_of)
        .next()
        .unwrap_or_default()
}

/// Credited people or categories for `role`, repetitions kept.
fn credits(game: Node, role: &str) -> Vec<String> {
    game.find(Name(role).or(Name("link").and(Attr("type", role))))
        .filter_map(text_of)
        .collect()
}

fn poll<'a>(game: Node<'a>, name: &str) -> Option<Node<'a>> {
    game.find(Name("poll").and(Attr("name", name))).next()
}

fn votes(result: Node) -> u32 {
    result.attr("numvotes")
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(0)
}

/// "21 and up" -> 21
fn leading_number(value: &str) -> Option<u32> {
    let digits: String = value.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<u32>().ok()
}

/// Most voted option of the age poll, the younger age wins a tie.
/// A poll nobody voted in yields its youngest age.
fn community_age(game: Node) -> Option<u32> {
    let poll = poll(game, "suggested_playerage")?;
    let mut top: Option<(u32, u32)> = None; // (votes, age)
    for result in poll.find(Name("result")) {
        let age = match result.attr("value").and_then(leading_number) {
            Some(age) => age,
            None => continue
        };
        let n = votes(result);
        top = match top {
            Some((v, a)) if v > n || (v == n && a <= age) => Some((v, a)),
            _ => Some((n, age))
        };
    }
    top.map(|(_, age)| age)
}

#[derive(Debug, PartialEq)]
struct CountVotes {
    count: u32,
    best: u64,
    total: u64
}

fn player_votes(game: Node) -> Vec<CountVotes> {
    let poll = match poll(game, "suggested_numplayers") {
        Some(p) => p,
        None => return Vec::new()
    };
    let mut counts = Vec::new();
    for results in poll.find(Name("results")) {
        // "4+" and friends do not name a single player count
        let count = match results.attr("numplayers") {
            Some(n) if !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) => n.parse::<u32>(),
            _ => continue
        };
        let count = match count {
            Ok(c) => c,
            Err(_) => continue
        };
        let mut tally = CountVotes { count, best: 0, total: 0 };
        for result in results.find(Name("result")) {
            let n = u64::from(votes(result));
            tally.total = tally.total.saturating_add(n);
            if result.attr("value").map_or(false, |v| v.trim().eq_ignore_ascii_case("best")) {
                tally.best = tally.best.saturating_add(n);
            }
        }
        counts.push(tally);
    }
    counts
}

fn span(counts: impl Iterator<Item = u32>) -> Option<PlayerRange> {
    counts.fold(None, |range, c| match range {
        None => Some(PlayerRange { min: c, max: c }),
        Some(r) => Some(PlayerRange { min: r.min.min(c), max: r.max.max(c) })
    })
}

/// Counts where "Best" got more than half of the votes cast for them.
fn recommended_players(votes: &[CountVotes]) -> Option<PlayerRange> {
    span(votes.iter()
        .filter(|v| v.best > 0 && v.best.saturating_mul(2) > v.total)
        .map(|v| v.count))
}

fn best_players(votes: &[CountVotes]) -> Option<PlayerRange> {
    let mut top: Option<&CountVotes> = None;
    for v in votes {
        top = match top {
            Some(t) if t.best > v.best || (t.best == v.best && t.count <= v.count) => Some(t),
            _ => Some(v)
        };
    }
    let top = top.filter(|t| t.best > 0)?;
    Some(PlayerRange { min: top.count, max: top.count })
}

fn strip_rank(label: &str) -> &str {
    let label = label.trim();
    match label.len().checked_sub(4).and_then(|i| label.get(i..).map(|tail| (i, tail))) {
        Some((i, tail)) if tail.eq_ignore_ascii_case("rank") => label[..i].trim_end(),
        _ => label
    }
}

/// Ranks inside the families the game belongs to. The overall
/// board game rank (`type="subtype"`) and "Not Ranked" entries are left out.
fn types(game: Node) -> Vec<TypeRank> {
    game.find(Name("rank"))
        .filter_map(|rank| {
            if rank.attr("type").map_or(false, |t| t.eq_ignore_ascii_case("subtype")) {
                return None;
            }
            let value = rank.attr("value")?.trim().parse::<u32>().ok()?;
            let name = rank.attr("friendlyname")
                .map(strip_rank)
                .filter(|n| !n.is_empty())
                .or_else(|| rank.attr("name"))?;
            Some(TypeRank { name: name.to_string(), rank: value })
        })
        .collect()
}
