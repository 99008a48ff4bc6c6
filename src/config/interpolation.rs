// Copyright 2026 The Chatrelay Project
// SPDX-License-Identifier: Apache-2.0

use super::error::ConfigError;

/// Resolves `${VAR_NAME}` references in a string using `lookup`.
/// Returns `ConfigError::UndefinedVariable` if `lookup` has no value for a
/// referenced variable.
pub fn resolve_with<F>(input: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            let mut found_close = false;
            for c in chars.by_ref() {
                if c == '}' {
                    found_close = true;
                    break;
                }
                var_name.push(c);
            }
            if !found_close || var_name.is_empty() {
                // Malformed interpolation -- treat literally
                result.push('$');
                result.push('{');
                result.push_str(&var_name);
                continue;
            }
            let value = lookup(&var_name).ok_or_else(|| ConfigError::UndefinedVariable {
                name: var_name.clone(),
            })?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

/// Resolves `${VAR_NAME}` references from process environment variables.
pub fn resolve_variables(input: &str) -> Result<String, ConfigError> {
    resolve_with(input, |name| std::env::var(name).ok())
}
