use regex::Regex;

/// Decides which top-level primary classes are part of the API under test.
pub trait InclusionFilter: Send + Sync {
    fn accepts(&self, binary_name: &str, canonical_name: &str) -> bool;

    fn rejects(&self, binary_name: &str, canonical_name: &str) -> bool;

    /// Verdict for classes the filter neither accepts nor rejects.
    fn default_inclusion_case(&self) -> bool;
}

/// Every class is part of the API.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl InclusionFilter for AcceptAll {
    fn accepts(&self, _binary_name: &str, _canonical_name: &str) -> bool {
        false
    }

    fn rejects(&self, _binary_name: &str, _canonical_name: &str) -> bool {
        false
    }

    fn default_inclusion_case(&self) -> bool {
        true
    }
}

/// Include and exclude lists of regular expressions. Class patterns match the
/// whole canonical class name, package patterns the whole package name. With
/// no include patterns of either kind everything not excluded is included.
#[derive(Debug, Clone, Default)]
pub struct PatternFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    include_packages: Vec<Regex>,
    exclude_packages: Vec<Regex>,
}

impl PatternFilter {
    pub fn new<I, E, S>(include: I, exclude: E) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            include: compile_all(include)?,
            exclude: compile_all(exclude)?,
            ..Self::default()
        })
    }

    pub fn with_packages<I, E, S>(mut self, include: I, exclude: E) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.include_packages = compile_all(include)?;
        self.exclude_packages = compile_all(exclude)?;
        Ok(self)
    }
}

fn compile_all<I, S>(patterns: I) -> Result<Vec<Regex>, regex::Error>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    patterns
        .into_iter()
        .map(|pattern| Regex::new(&format!("^(?:{})$", pattern.as_ref())))
        .collect()
}

fn package_of(canonical_name: &str) -> &str {
    canonical_name
        .rsplit_once('.')
        .map(|(package, _)| package)
        .unwrap_or("")
}

impl InclusionFilter for PatternFilter {
    fn accepts(&self, _binary_name: &str, canonical_name: &str) -> bool {
        let package = package_of(canonical_name);
        self.include.iter().any(|re| re.is_match(canonical_name))
            || self.include_packages.iter().any(|re| re.is_match(package))
    }

    fn rejects(&self, _binary_name: &str, canonical_name: &str) -> bool {
        let package = package_of(canonical_name);
        self.exclude.iter().any(|re| re.is_match(canonical_name))
            || self.exclude_packages.iter().any(|re| re.is_match(package))
    }

    fn default_inclusion_case(&self) -> bool {
        self.include.is_empty() && self.include_packages.is_empty()
    }
}
