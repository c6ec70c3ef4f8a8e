//! Cache key definitions.

use std::fmt;

/// Identifies one rendered fragment: a fragment name plus the values it varies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FragmentKey {
    name: &'static str,
    vary_on: Vec<String>,
}

impl FragmentKey {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            vary_on: Vec::new(),
        }
    }

    pub fn vary(mut self, value: impl ToString) -> Self {
        self.vary_on.push(value.to_string());
        self
    }

    /// Home listing fragment for the given (already clamped) page number.
    pub fn index_page(number: u64) -> Self {
        Self::new("index_page").vary(number)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for FragmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fragment:{}", self.name)?;
        for value in &self.vary_on {
            write!(f, ":{value}")?;
        }
        Ok(())
    }
}
