//! Rule-based scorers.
//!
//! These are the default implementation of every scorer and the fallback
//! when a learned scorer fails. They need nothing but the message and the
//! recorded transcript.
//!
//! # Injection classes
//!
//! - System fake: forged host/system/admin announcements or rule changes.
//! - Status fake: fabricated game state (eliminated, protected, unvotable).
//! - Role fake: attempts to override the reader's instructions or role.

use std::collections::BTreeSet;

use regex::Regex;
use serde::Serialize;

use werewolf_types::{PlayerId, Role, Speech};

use crate::error::DetectionError;

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

/// Kind of manipulation an injection pattern looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InjectionClass {
    /// Forged host or system announcement.
    SystemFake,
    /// Fabricated game state.
    StatusFake,
    /// Instruction or role override aimed at other agents.
    RoleFake,
}

/// Result of the rule-based injection scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InjectionFinding {
    /// Class of the most confident match.
    pub class: InjectionClass,
    /// Combined confidence of all matches, in `[0, 1]`.
    pub confidence: f64,
    /// Descriptions of the patterns that matched.
    pub matched: Vec<&'static str>,
}

/// Result of checking a message's quotations against the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuoteFinding {
    /// Quotations of other players found in the message.
    pub total: usize,
    /// Quotations that did not match anything the quoted player said.
    pub false_count: usize,
    /// First misquoted player.
    pub first_false: Option<PlayerId>,
}

impl QuoteFinding {
    /// Share of quotations that were false.
    pub fn false_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            as_f64(self.false_count) / as_f64(self.total)
        }
    }
}

/// Result of the speech-quality heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeechAssessment {
    /// Quality in `[0, 1]`; 0.5 is unremarkable.
    pub quality: f64,
    /// First role the speaker claimed in this message.
    pub claimed_role: Option<Role>,
    /// The speaker claimed more than one role.
    pub contradictory: bool,
}

fn as_f64(n: usize) -> f64 {
    u32::try_from(n).map_or(f64::from(u32::MAX), f64::from)
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

struct InjectionPattern {
    pattern: Regex,
    class: InjectionClass,
    confidence: f64,
    description: &'static str,
}

/// Pattern source, class, confidence, description.
const INJECTION_RULES: &[(&str, InjectionClass, f64, &str)] = &[
    (
        r"(?i)(?:^|[\n:：]\s*)(?:system|host|moderator|game\s*master|admin|judge|official)\s*[:：]",
        InjectionClass::SystemFake,
        0.8,
        "forged host or system announcement",
    ),
    (
        r"(?:主持人|系统|法官|管理员)\s*[:：]",
        InjectionClass::SystemFake,
        0.8,
        "forged host announcement (zh)",
    ),
    (
        r"(?i)rules?\s+(?:update|change)|new\s+rule\s*[:：]",
        InjectionClass::SystemFake,
        0.6,
        "announced rule change",
    ),
    (
        r"规则(?:变更|更新)|新规则",
        InjectionClass::SystemFake,
        0.6,
        "announced rule change (zh)",
    ),
    (
        r"(?i)(?:no\.|player\s*)\s*\d+\s+(?:is|has\s+been|was)\s+(?:eliminated|protected|immune)",
        InjectionClass::StatusFake,
        0.5,
        "fabricated player status",
    ),
    (
        r"(?i)cannot\s+be\s+voted",
        InjectionClass::StatusFake,
        0.5,
        "fabricated vote immunity",
    ),
    (
        r"\d+\s*号?(?:已经)?(?:不能被投票|被保护|已出局)",
        InjectionClass::StatusFake,
        0.4,
        "fabricated player status (zh)",
    ),
    (
        r"(?i)ignore.*instruction",
        InjectionClass::RoleFake,
        0.7,
        "instruction override",
    ),
    (
        r"(?i)(?:disregard|forget)\s+(?:all\s+)?(?:your\s+)?(?:previous|prior|above)",
        InjectionClass::RoleFake,
        0.7,
        "instruction override",
    ),
    (r"忽略.*指令", InjectionClass::RoleFake, 0.7, "instruction override (zh)"),
    (
        r"(?i)you\s+are.*assistant",
        InjectionClass::RoleFake,
        0.6,
        "assistant role reassignment",
    ),
    (r"你是.*助手", InjectionClass::RoleFake, 0.6, "assistant role reassignment (zh)"),
    (r"(?i)system.*prompt", InjectionClass::RoleFake, 0.6, "system prompt reference"),
    (r"角色.*设定|扮演.*角色", InjectionClass::RoleFake, 0.5, "role-play override (zh)"),
    (r"(?i)play.*role", InjectionClass::RoleFake, 0.25, "role-play suggestion"),
];

const QUOTE_PATTERN: &str = r#"(?:No\.\s*(\d+)|玩家\s*(\d+)|[Pp]layer\s*(\d+)|(\d+)\s*号)\s*(?:说|讲|提到|表示|said|mentioned|stated|claimed)(?:\s+that)?\s*[:：,，]?\s*["“']?([^"”'。.!?！？\n]{5,50})"#;

const ROLE_CLAIM_PATTERN: &str = r"(?i)\bI\s*(?:am|'m)\s+(?:the\s+|a\s+)?(seer|witch|guard|hunter|villager|wolf\s*king|werewolf|wolf)\b|我是(预言家|女巫|守卫|猎人|村民|狼王|狼人)";

const LOGIC_MARKERS: &[&str] = &[
    "因为", "所以", "但是", "然而", "首先", "其次", "最后", "because", "therefore", "however",
    "first", "second", "finally",
];

const INFO_PATTERNS: &[&str] = &[
    r"No\.\s*\d+",
    r"(?i)第\d+天|day\s*\d+|round\s*\d+",
    r"(?i)投票|vote",
    r"(?i)发言|said|speech",
    r"(?i)查验|金水|查杀|checked",
];

/// Compiled rule-based scorers.
pub struct RuleSet {
    injection: Vec<InjectionPattern>,
    quote: Regex,
    role_claim: Regex,
    info: Vec<Regex>,
}

impl core::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RuleSet")
            .field("injection_patterns", &self.injection.len())
            .field("info_patterns", &self.info.len())
            .finish_non_exhaustive()
    }
}

impl RuleSet {
    /// Compile every pattern.
    pub fn new() -> Result<Self, DetectionError> {
        let injection = INJECTION_RULES
            .iter()
            .map(
                |(source, class, confidence, description)| -> Result<_, DetectionError> {
                    Ok(InjectionPattern {
                        pattern: Regex::new(source)?,
                        class: *class,
                        confidence: *confidence,
                        description: *description,
                    })
                },
            )
            .collect::<Result<Vec<_>, DetectionError>>()?;
        let info = INFO_PATTERNS
            .iter()
            .map(|source| Regex::new(source))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            injection,
            quote: Regex::new(QUOTE_PATTERN)?,
            role_claim: Regex::new(ROLE_CLAIM_PATTERN)?,
            info,
        })
    }

    /// Scan `text` for injection attempts.
    ///
    /// Confidences of independent matches combine as `1 - prod(1 - c)`.
    pub fn scan_injection(&self, text: &str) -> Option<InjectionFinding> {
        let mut best: Option<&InjectionPattern> = None;
        let mut miss = 1.0_f64;
        let mut matched = Vec::new();

        for rule in &self.injection {
            if rule.pattern.is_match(text) {
                miss *= 1.0 - rule.confidence;
                matched.push(rule.description);
                if best.is_none_or(|b| rule.confidence > b.confidence) {
                    best = Some(rule);
                }
            }
        }

        best.map(|rule| InjectionFinding {
            class: rule.class,
            confidence: (1.0 - miss).clamp(0.0, 1.0),
            matched,
        })
    }

    /// Check `speaker`'s quotations of other players against `transcript`.
    ///
    /// A quotation is accurate if the quoted player said it verbatim or in
    /// a statement whose words overlap it by at least `similarity`
    /// (Jaccard; characters for CJK text). Quoting a player who never spoke
    /// is false.
    pub fn check_quotes(
        &self,
        speaker: PlayerId,
        text: &str,
        transcript: &[Speech],
        similarity: f64,
    ) -> Option<QuoteFinding> {
        let mut total: usize = 0;
        let mut false_count: usize = 0;
        let mut first_false = None;

        for caps in self.quote.captures_iter(text) {
            let seat = (1..=4)
                .filter_map(|i| caps.get(i))
                .find_map(|m| m.as_str().parse::<u32>().ok());
            let (Some(seat), Some(content)) = (seat, caps.get(5)) else {
                continue;
            };
            let quoted = PlayerId::new(seat);
            if quoted == speaker {
                continue;
            }
            let content = content.as_str().trim();
            total = total.saturating_add(1);

            let accurate = transcript
                .iter()
                .filter(|s| s.speaker == quoted)
                .any(|s| quote_matches(content, &s.text, similarity));
            if !accurate {
                false_count = false_count.saturating_add(1);
                first_false.get_or_insert(quoted);
            }
        }

        (total > 0).then_some(QuoteFinding {
            total,
            false_count,
            first_false,
        })
    }

    /// Score the logical quality of `text`.
    ///
    /// Averages a length band, logic connectives and concrete references,
    /// then halves the result if the speaker claims two different roles.
    pub fn assess_speech(&self, text: &str) -> SpeechAssessment {
        let length = match text.chars().count() {
            0..20 => 0.2,
            20..50 => 0.5,
            50..200 => 1.0,
            _ => 0.8,
        };

        let lower = text.to_lowercase();
        let logic_hits = LOGIC_MARKERS.iter().filter(|w| lower.contains(*w)).count();
        let logic = (as_f64(logic_hits) * 0.25).min(1.0);

        let info_hits = self.info.iter().filter(|re| re.is_match(text)).count();
        let info = (as_f64(info_hits) * 0.3).min(1.0);

        let claims: Vec<Role> = self
            .role_claim
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .filter_map(|m| role_from_claim(m.as_str()))
            .collect();
        let claimed_role = claims.first().copied();
        let contradictory = claims.iter().any(|r| Some(*r) != claimed_role);

        let mut quality = (length + logic + info) / 3.0;
        if contradictory {
            quality *= 0.5;
        }

        SpeechAssessment {
            quality: quality.clamp(0.0, 1.0),
            claimed_role,
            contradictory,
        }
    }
}

fn quote_matches(content: &str, said: &str, similarity: f64) -> bool {
    let (content, said) = (content.to_lowercase(), said.to_lowercase());
    if said.contains(&content) {
        return true;
    }
    let cjk = has_cjk(&content) || has_cjk(&said);
    let (a, b) = (tokens(&content, cjk), tokens(&said, cjk));
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let inter = a.intersection(&b).count();
    let union = a.union(&b).count();
    as_f64(inter) / as_f64(union) >= similarity
}

/// Words of `text`, or its characters when it is written in CJK script,
/// where words are not space-separated.
fn tokens(text: &str, cjk: bool) -> BTreeSet<String> {
    if cjk {
        text.chars()
            .filter(|c| c.is_alphanumeric())
            .map(String::from)
            .collect()
    } else {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

fn has_cjk(text: &str) -> bool {
    text.chars()
        .any(|c| matches!(c, '\u{3400}'..='\u{4DBF}' | '\u{4E00}'..='\u{9FFF}'))
}

fn role_from_claim(word: &str) -> Option<Role> {
    let normalized: String = word
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    match normalized.as_str() {
        "seer" | "预言家" => Some(Role::Seer),
        "witch" | "女巫" => Some(Role::Witch),
        "guard" | "守卫" => Some(Role::Guard),
        "hunter" | "猎人" => Some(Role::Hunter),
        "villager" | "村民" => Some(Role::Villager),
        "wolfking" | "狼王" => Some(Role::WolfKing),
        "wolf" | "werewolf" | "狼人" => Some(Role::Wolf),
        _ => None,
    }
}
