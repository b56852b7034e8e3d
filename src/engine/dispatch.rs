//! Plugin dispatch (stage one of the pipeline).
//!
//! Runs every configured plugin's pattern set over the input and hands the
//! match structure to the plugin's recognizer. The output is a flat list of
//! candidate tag events, normalized so the resolver can rely on them:
//! default suffix assigned, origin plugin stamped.
//!
//! Matching is global, set-ordered, with byte offsets: each pattern yields
//! every non-overlapping match, and each match carries its capture groups as
//! `(text, offset)` pairs.
//!
//! The per-plugin `regexp_limit` is the one place a parse can fail: under
//! [`LimitAction::Abort`] the overflow unwinds the whole parse as
//! [`EngineError::RegexpLimitExceeded`]. Every other action drops the excess
//! matches, logs, and keeps going.

use std::collections::HashMap;

use crate::engine::log::{ParseLog, Severity};
use crate::plugins::Recognizer;
use crate::schema::{LimitAction, PluginConfig, Schema};
use crate::{MatchGroup, PatternMatch, TagEvent};

/// The fatal error taxonomy. Everything else the engine recovers from and
/// records in the parse log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// A plugin ran past its match budget under `LimitAction::Abort`.
    #[error("plugin {plugin} exceeded its regexp limit of {limit}")]
    RegexpLimitExceeded { plugin: String, limit: usize },
}

/// Run all plugins in configured order and collect their candidate events.
pub(crate) fn run_plugins(
    text: &str,
    schema: &Schema,
    recognizers: &HashMap<String, Box<dyn Recognizer>>,
    log: &mut ParseLog,
) -> Result<Vec<TagEvent>, EngineError> {
    let mut events = Vec::new();

    for plugin in &schema.plugins {
        let matches = collect_matches(text, plugin, log)?;
        let total: usize = matches.iter().map(Vec::len).sum();
        if total == 0 {
            // The recognizer is not invoked at all for a silent plugin.
            continue;
        }

        let Some(recognizer) = recognizers.get(&plugin.name) else {
            log.add(
                Severity::Debug,
                format!("No recognizer registered for plugin {}", plugin.name),
                None,
                None,
                None,
            );
            continue;
        };

        let produced = recognizer.get_tags(text, &matches);
        log::trace!("plugin {}: {} match(es), {} event(s)", plugin.name, total, produced.len());

        for mut event in produced {
            if event.suffix.is_empty() {
                event.suffix = format!("-{}", plugin.name);
            }
            event.plugin_name = plugin.name.clone();
            events.push(event);
        }
    }

    Ok(events)
}

/// Match one plugin's patterns, enforcing its match budget.
///
/// Truncation is per-pattern: the overflowing pattern keeps the matches that
/// fit under the budget and the plugin's remaining patterns are skipped
/// entirely.
fn collect_matches(
    text: &str,
    plugin: &PluginConfig,
    log: &mut ParseLog,
) -> Result<Vec<Vec<PatternMatch>>, EngineError> {
    let mut all = Vec::with_capacity(plugin.regexps.len());
    let mut running = 0usize;

    'patterns: for re in &plugin.regexps {
        let mut matches = Vec::new();
        for caps in re.captures_iter(text) {
            if running == plugin.regexp_limit {
                let msg = format!(
                    "{} limit exceeded. Only the first {} matches will be processed",
                    plugin.name, plugin.regexp_limit
                );
                match plugin.limit_action {
                    LimitAction::Abort => {
                        return Err(EngineError::RegexpLimitExceeded {
                            plugin: plugin.name.clone(),
                            limit: plugin.regexp_limit,
                        });
                    }
                    LimitAction::Ignore => log.add(Severity::Debug, msg, None, None, None),
                    LimitAction::Warn => log.add(Severity::Warning, msg, None, None, None),
                }
                all.push(matches);
                break 'patterns;
            }
            running += 1;

            let Some(whole) = caps.get(0) else { continue };
            matches.push(PatternMatch {
                whole: MatchGroup { text: whole.as_str().to_string(), start: whole.start() },
                groups: (1..caps.len())
                    .map(|i| {
                        caps.get(i)
                            .map(|g| MatchGroup { text: g.as_str().to_string(), start: g.start() })
                    })
                    .collect(),
            });
        }
        all.push(matches);
    }

    Ok(all)
}
