use regex::Regex;
use std::collections::BTreeSet;

/// Consensus event names and phrases worth keeping.
///
/// Matched as case-sensitive substrings, not whole words.
pub const CONSENSUS_KEYWORDS: &[&str] = &[
    "NewEpoch",
    "NewRound",
    "CommitViaBlock",
    "Timeout",
    "RoundTimeout",
    "ReceiveRoundTimeout",
    "Vote",
    "VoteNIL",
    "Propose",
    "OptPropose",
    "ReceiveProposal",
    "ReceiveOptProposal",
    "ProcessOptProposal",
    "ReceiveSyncInfo",
    "SyncInfo",
    "ReceiveNewCertificate",
    "NetworkReceiveProposal",
    "NetworkReceiveOptProposal",
    "NetworkReceiveSyncInfo",
    "Broadcast",
    "BroadcastOrderVote",
    "BroadcastRandShareFastPath",
    "ReceiveOrderVote",
    "OrderVote",
    "ReceiveVote",
    "Signed ledger info",
    "Receive commit vote",
    "Receive ordered block",
    "leader",
    "Leader",
    "proposer",
    "Proposer",
    "proposer_election",
    "rotating_proposer",
    "pacemaker",
    "Pacemaker",
];

/// Keyword relevance check for candidate log lines
#[derive(Clone)]
pub struct RelevanceFilter {
    /// Alternation of the escaped keywords (`None` when there are none)
    regex: Option<Regex>,

    keywords: Vec<String>,
}

impl RelevanceFilter {
    /// Build a filter over the consensus keyword set
    pub fn consensus() -> Result<Self, regex::Error> {
        Self::new(CONSENSUS_KEYWORDS.iter().copied())
    }

    /// Build a filter over an arbitrary keyword set
    pub fn new<I, S>(keywords: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        let regex = if keywords.is_empty() {
            None
        } else {
            let pattern = keywords
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&pattern)?)
        };

        Ok(Self { regex, keywords })
    }

    /// Does `text` contain any keyword?
    pub fn is_match(&self, text: &str) -> bool {
        match &self.regex {
            Some(re) => re.is_match(text),
            None => false,
        }
    }

    /// Accept on a matching event name first, then on the raw message
    pub fn accepts(&self, event: Option<&str>, msg: &str) -> bool {
        event.is_some_and(|e| self.is_match(e)) || self.is_match(msg)
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

impl std::fmt::Debug for RelevanceFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelevanceFilter")
            .field("keywords", &self.keywords.len())
            .finish()
    }
}

/// Level allow-list; empty means every level passes
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LevelFilter {
    levels: BTreeSet<String>,
}

impl LevelFilter {
    pub fn new<I, S>(levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let levels = levels
            .into_iter()
            .map(|l| l.as_ref().trim().to_uppercase())
            .filter(|l| !l.is_empty())
            .collect();
        Self { levels }
    }

    /// Parse a comma-separated list such as `info, Debug`
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn allows(&self, level: &str) -> bool {
        self.levels.is_empty() || self.levels.contains(level)
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn levels(&self) -> impl Iterator<Item = &str> {
        self.levels.iter().map(String::as_str)
    }
}
