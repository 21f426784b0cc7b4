//! The iterative resolution engine: one `resolve(bytes) -> bytes` entrypoint
//! that walks the delegation graph from cached hints (or the configured
//! roots) down to an answer, consulting and feeding the persistent cache
//! at every step.

use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::cache::Cache;
use crate::packet::{
    Message, Question, RCODE_NOTIMP, RCODE_NXDOMAIN, RCODE_SERVFAIL,
};
use crate::records::{DnsRecord, RecordClass, RecordType};
use crate::upstream;

/// Outer rounds for the client's original question. A pathological chain of
/// referrals eventually gives up rather than spinning forever.
const MAX_RECURSION: usize = 10;
/// Depth cap on the glue-warming recursive `answer()` calls a referral may
/// trigger — a separate budget from `MAX_RECURSION`, see the design note on
/// why these two counters don't share a budget.
const GLUE_WARM_MAX_DEPTH: usize = 5;

pub struct Resolver {
    cache: Arc<Cache>,
    root_servers: Vec<IpAddr>,
}

/// What a single round of `answer()` produced.
enum RoundOutcome {
    Answers(Vec<DnsRecord>),
    Rcode(u8),
    /// A referral was followed and glue warmed; the outer loop should
    /// consume one iteration and retry from the cache.
    Referral,
}

impl Resolver {
    pub fn new(cache: Arc<Cache>, root_servers: Vec<IpAddr>) -> Self {
        Self {
            cache,
            root_servers,
        }
    }

    /// The resolver's single operation. Never panics: every internal
    /// failure is downgraded to a `ServerFailure` response rather than
    /// propagated, matching the "unhandled exception" policy in the error
    /// handling design.
    pub async fn resolve(&self, request_bytes: &[u8]) -> Vec<u8> {
        if let Err(err) = self.cache.sweep_expired() {
            warn!(error = %err, "cache sweep failed, continuing without it");
        }

        let request = match Message::parse(request_bytes) {
            Ok((message, _)) => message,
            Err(err) => {
                debug!(error = %err, "dropping malformed request");
                return crate::packet::format_error_echo(request_bytes);
            }
        };

        if request.questions.len() != 1 || !request.questions[0].qtype.is_answerable() {
            return request.as_response(RCODE_NOTIMP).serialize();
        }

        let question = request.questions[0].clone();
        let mut rounds = 0usize;
        loop {
            if rounds >= MAX_RECURSION {
                info!(name = %question.name, "giving up after max iterations");
                return request.with_answers(Vec::new()).serialize();
            }
            rounds += 1;

            match self.answer(question.clone(), 0).await {
                RoundOutcome::Answers(records) => return request.with_answers(records).serialize(),
                RoundOutcome::Rcode(rcode) => return request.as_response(rcode).serialize(),
                RoundOutcome::Referral => continue,
            }
        }
    }

    /// Resolve one question: cache check, then pick upstream targets and
    /// probe them in order. Recursive through glue warming, hence boxed.
    fn answer(
        &self,
        question: Question,
        glue_depth: usize,
    ) -> Pin<Box<dyn Future<Output = RoundOutcome> + '_>> {
        Box::pin(async move {
            match self.cache.lookup_answer(&question.name, question.qtype) {
                Ok(records) if !records.is_empty() => return RoundOutcome::Answers(records),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "cache lookup failed, treating as empty"),
            }

            let targets = self.choose_targets(&question.name);
            self.probe_candidates(&question, &targets, glue_depth).await
        })
    }

    /// Most-specific-first cached delegation, falling back to the
    /// (shuffled) configured root servers when nothing is cached.
    fn choose_targets(&self, qname: &str) -> Vec<IpAddr> {
        for suffix in suffixes(qname) {
            match self.cache.lookup_delegation(&suffix) {
                Ok(rows) if !rows.is_empty() => {
                    return rows.into_iter().map(|(_, ip)| IpAddr::V4(ip)).collect();
                }
                Ok(_) => continue,
                Err(err) => {
                    warn!(error = %err, suffix = %suffix, "delegation lookup failed, treating as empty");
                    continue;
                }
            }
        }

        let mut roots = self.root_servers.clone();
        roots.shuffle(&mut rand::rng());
        roots
    }

    async fn probe_candidates(
        &self,
        question: &Question,
        targets: &[IpAddr],
        glue_depth: usize,
    ) -> RoundOutcome {
        let mut any_clean_no_progress = false;

        for &server in targets {
            let query = upstream::build_probe_query(question, rand::random::<u16>());
            let response = match upstream::probe(server, &query).await {
                Ok(response) => response,
                Err(err) => {
                    debug!(server = %server, error = %err, "upstream probe failed");
                    continue;
                }
            };

            self.cache_every_record(&response);

            let rcode = response.header.rcode();
            if rcode == RCODE_NXDOMAIN || rcode == crate::packet::RCODE_REFUSED {
                return RoundOutcome::Rcode(rcode);
            }
            if !response.answers.is_empty() {
                return RoundOutcome::Answers(response.answers);
            }
            if !response.authorities.is_empty() {
                self.warm_glue(&response, glue_depth).await;
                return RoundOutcome::Referral;
            }
            any_clean_no_progress = true;
        }

        if any_clean_no_progress {
            RoundOutcome::Rcode(RCODE_NXDOMAIN)
        } else {
            RoundOutcome::Rcode(RCODE_SERVFAIL)
        }
    }

    fn cache_every_record(&self, response: &Message) {
        for record in response
            .answers
            .iter()
            .chain(response.authorities.iter())
            .chain(response.additionals.iter())
        {
            if let Err(err) = self.cache.insert_record(record) {
                warn!(error = %err, name = %record.name, "failed to cache record");
            }
        }
    }

    /// Resolve any NS target named in `response`'s authorities that lacks
    /// glue in `response`'s additionals, purely to populate the cache for
    /// the outer loop's retry. Capped independently of `MAX_RECURSION`.
    async fn warm_glue(&self, response: &Message, glue_depth: usize) {
        if glue_depth >= GLUE_WARM_MAX_DEPTH {
            return;
        }

        for authority in &response.authorities {
            let Some(ns_target) = authority.ns_target() else {
                continue;
            };
            let has_glue = response
                .additionals
                .iter()
                .any(|r| r.name.eq_ignore_ascii_case(ns_target) && r.rtype == RecordType::A);
            if has_glue {
                continue;
            }

            let glue_question = Question {
                name: ns_target.to_string(),
                qtype: RecordType::A,
                qclass: RecordClass::IN,
            };
            self.answer(glue_question, glue_depth + 1).await;
        }
    }
}

/// Proper suffixes of `name`, most specific first, trailing dot preserved.
/// The root name yields an empty list.
fn suffixes(name: &str) -> Vec<String> {
    let trimmed = name.trim_end_matches('.');
    if trimmed.is_empty() {
        return Vec::new();
    }
    let labels: Vec<&str> = trimmed.split('.').collect();
    (0..labels.len())
        .map(|i| format!("{}.", labels[i..].join(".")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffixes_are_most_specific_first() {
        assert_eq!(
            suffixes("a.b.c."),
            vec!["a.b.c.".to_string(), "b.c.".to_string(), "c.".to_string()]
        );
    }

    #[test]
    fn root_name_has_no_suffixes() {
        assert!(suffixes(".").is_empty());
    }

    #[test]
    fn single_label_name_has_one_suffix() {
        assert_eq!(suffixes("com."), vec!["com.".to_string()]);
    }

    #[tokio::test]
    async fn cache_hit_short_circuits_without_network() {
        let cache = Arc::new(Cache::new(":memory:"));
        cache
            .insert_record(&DnsRecord::a(
                "example.com.",
                "93.184.216.34".parse().unwrap(),
                3600,
            ))
            .unwrap();
        let resolver = Resolver::new(cache, vec![]);

        let mut query = vec![0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        crate::packet::encode_name("example.com.", &mut query);
        query.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);

        let response_bytes = resolver.resolve(&query).await;
        let (response, _) = Message::parse(&response_bytes).unwrap();
        assert!(response.header.is_response());
        assert_eq!(response.header.rcode(), crate::packet::RCODE_NOERROR);
        assert_eq!(response.answers.len(), 1);
    }

    #[tokio::test]
    async fn unsupported_qtype_yields_not_implemented() {
        let cache = Arc::new(Cache::new(":memory:"));
        let resolver = Resolver::new(cache, vec![]);

        let mut query = vec![0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        crate::packet::encode_name("example.com.", &mut query);
        query.extend_from_slice(&[0x00, 0x10, 0x00, 0x01]); // TXT

        let response_bytes = resolver.resolve(&query).await;
        let (response, _) = Message::parse(&response_bytes).unwrap();
        assert_eq!(response.header.rcode(), RCODE_NOTIMP);
    }

    #[tokio::test]
    async fn multi_question_yields_not_implemented() {
        let cache = Arc::new(Cache::new(":memory:"));
        let resolver = Resolver::new(cache, vec![]);

        let mut query = vec![0x12, 0x34, 0x01, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        crate::packet::encode_name("example.com.", &mut query);
        query.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
        crate::packet::encode_name("example.org.", &mut query);
        query.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);

        let response_bytes = resolver.resolve(&query).await;
        let (response, _) = Message::parse(&response_bytes).unwrap();
        assert_eq!(response.header.id, 0x1234);
        assert!(response.header.is_response());
        assert_eq!(response.header.rcode(), RCODE_NOTIMP);
    }

    #[tokio::test]
    async fn all_roots_unreachable_yields_server_failure() {
        let cache = Arc::new(Cache::new(":memory:"));
        // Ports 53 on these addresses are never reachable in a test sandbox.
        let resolver = Resolver::new(cache, vec!["10.255.255.1".parse().unwrap()]);

        let mut query = vec![0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        crate::packet::encode_name("example.com.", &mut query);
        query.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);

        let response_bytes = resolver.resolve(&query).await;
        let (response, _) = Message::parse(&response_bytes).unwrap();
        assert_eq!(response.header.rcode(), RCODE_SERVFAIL);
    }
}
