use std::collections::HashMap;

use parking_lot::Mutex;
use regex::Regex;

use super::FilterPredicate;
use super::PredicateContext;
use crate::Error;
use crate::Result;

pub const MIME_TYPE_PREDICATE: &str = "mime_type";
pub const FILE_ID_PATTERN_PREDICATE: &str = "file_id_pattern";

/// Accepts files whose mime type is in the comma-separated `params` list.
#[derive(Debug, Default, Clone, Copy)]
pub struct MimeTypePredicate;

impl FilterPredicate for MimeTypePredicate {
    fn evaluate(
        &self,
        ctx: &PredicateContext<'_>,
    ) -> Result<bool> {
        Ok(ctx
            .params
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .any(|m| m.eq_ignore_ascii_case(ctx.mime_type)))
    }
}

/// Accepts files whose id matches the regular expression in `params`.
#[derive(Debug, Default)]
pub struct FileIdPatternPredicate {
    pub(crate) compiled: Mutex<HashMap<String, Regex>>,
}

impl FilterPredicate for FileIdPatternPredicate {
    fn evaluate(
        &self,
        ctx: &PredicateContext<'_>,
    ) -> Result<bool> {
        let mut compiled = self.compiled.lock();
        if !compiled.contains_key(ctx.params) {
            let regex = Regex::new(ctx.params).map_err(|e| {
                Error::Fatal(format!("invalid file_id_pattern {:?}: {}", ctx.params, e))
            })?;
            compiled.insert(ctx.params.to_string(), regex);
        }
        Ok(compiled
            .get(ctx.params)
            .is_some_and(|regex| regex.is_match(ctx.file_id)))
    }
}
