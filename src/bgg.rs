use failure::{Error, Fail, ResultExt, bail};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use select::document::Document;
use select::predicate::{Class, Name, Predicate};
use std::thread;
use std::time::Duration;
use crate::GameId;

pub type Headers = Vec<(&'static str, String)>;

/// BGG refused our credentials. Nothing sensible can be done after that.
#[derive(Debug, Fail)]
#[fail(display = "BGG rejected the credentials for `{}` with status {}", url, status)]
pub struct Unauthorized {
    pub url: String,
    pub status: u16
}

/// Anything able to turn an url into a response body.
pub trait Transport {
    fn fetch(&self, url: &str, headers: &Headers) -> Result<String, Error>;
}

impl Transport for Client {
    fn fetch(&self, url: &str, headers: &Headers) -> Result<String, Error> {
        let mut req = self.get(url);
        for (name, value) in headers {
            req = req.header(*name, value.as_str());
        }
        let resp = req.send()
            .with_context(|_| format!("could not download page `{}`", url))?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Unauthorized { url: url.to_string(), status: status.as_u16() }.into());
        }
        if status != StatusCode::OK {
            bail!("Can't get page `{}`. Status: {}", url, status);
        }
        Ok(resp.text()?)
    }
}

pub fn headers(user_agent: &str, token: &str) -> Headers {
    vec![
        ("User-Agent", user_agent.to_string()),
        ("Accept", "application/xml".to_string()),
        ("Authorization", format!("Bearer {}", token))
    ]
}

pub trait Pause {
    fn pause(&mut self, delay: Duration);
}

pub struct Sleep;

impl Pause for Sleep {
    fn pause(&mut self, delay: Duration) {
        thread::sleep(delay);
    }
}

/// One request and the delay owed to BGG once it is done.
#[derive(Debug, PartialEq, Clone)]
pub struct Step {
    pub url: String,
    pub delay_after: Duration
}

impl Step {
    pub fn new(url: String, delay_after: Duration) -> Step {
        Step { url, delay_after }
    }
}

/// Issues steps one by one. The delay of a step is paid right before
/// the next request, so the last step of a run never sleeps.
pub struct Session<'a> {
    transport: &'a dyn Transport,
    pause: &'a mut dyn Pause,
    headers: Headers,
    owed: Option<Duration>,
    requests: u32
}

impl<'a> Session<'a> {
    pub fn new(transport: &'a dyn Transport, pause: &'a mut dyn Pause, headers: Headers) -> Session<'a> {
        Session { transport, pause, headers, owed: None, requests: 0 }
    }

    pub fn request(&mut self, step: &Step) -> Result<String, Error> {
        if let Some(delay) = self.owed.take() {
            self.pause.pause(delay);
        }
        self.requests += 1;
        let body = self.transport.fetch(&step.url, &self.headers);
        self.owed = Some(step.delay_after);
        body
    }

    pub fn requests(&self) -> u32 {
        self.requests
    }
}

pub fn browse_url(template: &str, page: u32) -> String {
    template.replace("{page}", &page.to_string())
}

pub fn stats_url(template: &str, ids: &[GameId]) -> String {
    let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    template.replace("{ids}", &ids.join(","))
}

/// Walks browse pages until BGG runs out of them.
pub struct PageIterator<'s, 'a> {
    session: &'s mut Session<'a>,
    template: String,
    delay: Duration,
    page: u32,
    seen: Option<GameId>
}

impl<'s, 'a> PageIterator<'s, 'a> {
    pub fn new(session: &'s mut Session<'a>, template: &str, delay: Duration) -> PageIterator<'s, 'a> {
        PageIterator { session, template: template.to_string(), delay, page: 0, seen: None }
    }

    pub fn page(&self) -> u32 {
        self.page
    }
}

impl<'s, 'a> Iterator for PageIterator<'s, 'a> {
    type Item = Result<Vec<GameId>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.page += 1;
        let step = Step::new(browse_url(&self.template, self.page), self.delay);
        match self.session.request(&step) {
            Ok(body) => {
                let ids = filter_ids(&Document::from(body.as_str()));
                // past the last page BGG keeps serving the same listing
                if ids.first() == self.seen.as_ref() || ids.is_empty() {
                    None
                } else {
                    self.seen = Some(ids[0]);
                    Some(Ok(ids))
                }
            },
            Err(e) => Some(Err(e))
        }
    }
}

/// Game ids of a browse page in rank order.
pub fn filter_ids(doc: &Document) -> Vec<GameId> {
    doc.find(Name("a").and(Class("primary")))
        .filter_map(|link| link.attr("href"))
        .filter_map(href_to_id)
        .collect()
}

fn href_to_id(href: &str) -> Option<GameId> {
    let mut parts = href.split('/').skip_while(|p| *p != "boardgame");
    parts.next()?;
    parts.next()?.parse::<GameId>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn ids_follow_listing_order() {
        let doc = Document::from(include_str!("../tests/fixtures/browse.html"));
        assert_eq!(filter_ids(&doc), vec![224517, 161936, 174430, 342942]);
    }

    #[test]
    fn href_without_id_is_skipped() {
        assert_eq!(href_to_id("/boardgame/224517/brass-birmingham"), Some(224517));
        assert_eq!(href_to_id("https://boardgamegeek.com/boardgame/13"), Some(13));
        assert_eq!(href_to_id("/boardgame/"), None);
        assert_eq!(href_to_id("/boardgamefamily/abc"), None);
        assert_eq!(href_to_id("/user/someone"), None);
    }

    #[test]
    fn urls_are_filled_in() {
        assert_eq!(browse_url("https://bgg.test/page/{page}", 3), "https://bgg.test/page/3");
        assert_eq!(stats_url("https://bgg.test/xml/{ids}?stats=1", &[1, 22, 333]),
            "https://bgg.test/xml/1,22,333?stats=1");
    }

    #[test]
    fn headers_carry_bearer_token() {
        let h = headers("bgg_dump/test", "secret");
        assert!(h.contains(&("Authorization", "Bearer secret".to_string())));
        assert!(h.contains(&("Accept", "application/xml".to_string())));
        assert!(h.contains(&("User-Agent", "bgg_dump/test".to_string())));
    }

    struct Echo(RefCell<Vec<String>>);

    impl Transport for Echo {
        fn fetch(&self, url: &str, _headers: &Headers) -> Result<String, Error> {
            self.0.borrow_mut().push(url.to_string());
            Ok(url.to_string())
        }
    }

    #[derive(Default)]
    struct Recorder(Vec<Duration>);

    impl Pause for Recorder {
        fn pause(&mut self, delay: Duration) {
            self.0.push(delay);
        }
    }

    #[test]
    fn delay_is_paid_before_the_next_request() {
        let echo = Echo(RefCell::new(Vec::new()));
        let mut recorder = Recorder::default();
        {
            let mut session = Session::new(&echo, &mut recorder, Vec::new());
            let short = Duration::from_secs(2);
            let long = Duration::from_secs(10);
            session.request(&Step::new("a".into(), short)).unwrap();
            session.request(&Step::new("b".into(), long)).unwrap();
            session.request(&Step::new("c".into(), long)).unwrap();
            assert_eq!(session.requests(), 3);
        }
        assert_eq!(recorder.0, vec![Duration::from_secs(2), Duration::from_secs(10)]);
        assert_eq!(*echo.0.borrow(), vec!["a", "b", "c"]);
    }
}
