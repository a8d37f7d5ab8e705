//! Typed view of the options stored in the tool's configuration file.
//!
//! The configuration file holds two kinds of facts: a handful of core values
//! (input/output directories, file pattern, log names) and a larger set of
//! user options carried by `g_user_option(name, value)`. The catalogue below
//! is the single place that knows every user option, its value kind and,
//! for choice options, the token vocabulary in ordinal order. Both the loader
//! (token → ordinal) and the writer (ordinal → token) go through it.

use indexmap::IndexMap;
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Predicate that carries user options in the configuration file.
pub const USER_OPTION_PREDICATE: &str = "g_user_option";

/// Key of one configuration fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    /// Top-level predicate, e.g. `g_indir`
    Core(String),
    /// Option name nested under `g_user_option`
    User(String),
}

impl ConfigKey {
    pub fn core(name: impl Into<String>) -> Self {
        ConfigKey::Core(name.into())
    }

    pub fn user(name: impl Into<String>) -> Self {
        ConfigKey::User(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            ConfigKey::Core(name) | ConfigKey::User(name) => name,
        }
    }

    pub fn is_core(&self) -> bool {
        matches!(self, ConfigKey::Core(_))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigKey::Core(name) => f.write_str(name),
            ConfigKey::User(name) => write!(f, "{}({})", USER_OPTION_PREDICATE, name),
        }
    }
}

/// Errors raised when a user-supplied option value is rejected.
#[derive(Error, Debug, PartialEq)]
pub enum OptionError {
    #[error("Unknown option: {0}")]
    UnknownOption(String),

    #[error("Invalid value '{value}' for {option} (expected one of: {allowed})")]
    InvalidToken {
        option: String,
        value: String,
        allowed: String,
    },

    #[error("Invalid number '{value}' for {option}")]
    InvalidNumber { option: String, value: String },

    #[error("Invalid value for {option}: {reason}")]
    InvalidValue { option: String, reason: String },
}

/// Core facts written as `:-asserta(<predicate>('<value>')).`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreKey {
    InDir,
    OutDir,
    Pattern,
    LogFile,
    SummaryLog,
}

impl CoreKey {
    pub const ALL: [CoreKey; 5] = [
        CoreKey::InDir,
        CoreKey::OutDir,
        CoreKey::Pattern,
        CoreKey::LogFile,
        CoreKey::SummaryLog,
    ];

    pub fn predicate(&self) -> &'static str {
        match self {
            CoreKey::InDir => "g_indir",
            CoreKey::OutDir => "g_outdir",
            CoreKey::Pattern => "g_pattern",
            CoreKey::LogFile => "g_logfile",
            CoreKey::SummaryLog => "g_small_log",
        }
    }

    pub fn from_predicate(predicate: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.predicate() == predicate)
    }

    /// Resolve a predicate or one of the short names accepted on the command line.
    pub fn from_alias(name: &str) -> Option<Self> {
        if let Some(key) = Self::from_predicate(name) {
            return Some(key);
        }
        match name {
            "indir" | "in_dir" | "input" => Some(CoreKey::InDir),
            "outdir" | "out_dir" | "output" => Some(CoreKey::OutDir),
            "pattern" => Some(CoreKey::Pattern),
            "logfile" | "log_file" => Some(CoreKey::LogFile),
            "small_log" | "summary_log" => Some(CoreKey::SummaryLog),
            _ => None,
        }
    }

    pub fn config_key(&self) -> ConfigKey {
        ConfigKey::core(self.predicate())
    }

    /// Check a user-supplied value; a line break would split the assertion.
    pub fn parse<'a>(&self, input: &'a str) -> Result<&'a str, OptionError> {
        if input.contains(['\n', '\r']) {
            return Err(OptionError::InvalidValue {
                option: self.predicate().to_string(),
                reason: "value must be a single line".to_string(),
            });
        }
        Ok(input)
    }
}

/// Value kind of a user option.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptionKind {
    /// Closed vocabulary; index 0 is the default token
    Choice(&'static [&'static str]),
    Toggle {
        on: &'static str,
        off: &'static str,
    },
    Text,
    Integer,
    Float,
    /// Three scale factors written as `[x,y,z]`, or `no` when all are 1
    Rescale,
}

/// Catalogue entry for one user option.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionSpec {
    pub name: &'static str,
    pub kind: OptionKind,
}

const YES_NO: OptionKind = OptionKind::Toggle { on: "yes", off: "no" };

/// Every user option the tool understands.
pub static USER_OPTIONS: &[OptionSpec] = &[
    OptionSpec {
        name: "classification",
        kind: OptionKind::Choice(&["automatic", "character", "door", "effect", "item", "tile"]),
    },
    OptionSpec {
        name: "snap",
        kind: OptionKind::Choice(&["none", "binary", "decimal", "fine"]),
    },
    OptionSpec {
        name: "tvert_snap",
        kind: OptionKind::Choice(&["no", "256", "512", "1024"]),
    },
    OptionSpec {
        name: "use_Smoothed",
        kind: OptionKind::Choice(&["use", "ignore", "protect"]),
    },
    OptionSpec {
        name: "split_Priority",
        kind: OptionKind::Choice(&["convex", "concave"]),
    },
    OptionSpec {
        name: "fix_overhangs",
        kind: OptionKind::Choice(&["yes", "no", "interior_only"]),
    },
    OptionSpec {
        name: "dynamic_water",
        kind: OptionKind::Choice(&["yes", "no", "wavy"]),
    },
    OptionSpec {
        name: "rotate_water",
        kind: OptionKind::Choice(&["no_change", "1", "0"]),
    },
    OptionSpec {
        name: "tile_water",
        kind: OptionKind::Choice(&["no_change", "1", "2", "3"]),
    },
    OptionSpec {
        name: "tile_raise",
        kind: OptionKind::Choice(&["no", "raise", "lower"]),
    },
    OptionSpec {
        name: "slice",
        kind: OptionKind::Choice(&["yes", "no", "undo"]),
    },
    OptionSpec {
        name: "render",
        kind: OptionKind::Choice(&["default", "all", "none"]),
    },
    OptionSpec {
        name: "shadow",
        kind: OptionKind::Choice(&["default", "all", "none"]),
    },
    OptionSpec {
        name: "repivot",
        kind: OptionKind::Choice(&["if_needed", "all", "none"]),
    },
    OptionSpec {
        name: "pivots_below_z=0",
        kind: OptionKind::Choice(&["disallow", "allow", "slice"]),
    },
    OptionSpec {
        name: "move_bad_pivots",
        kind: OptionKind::Choice(&["no", "top", "middle", "bottom"]),
    },
    OptionSpec {
        name: "foliage",
        kind: OptionKind::Choice(&["no_change", "tilefade", "animate", "de-animate", "ignore"]),
    },
    OptionSpec {
        name: "rotate_ground",
        kind: OptionKind::Choice(&["no_change", "1", "0"]),
    },
    OptionSpec {
        name: "chamfer",
        kind: OptionKind::Choice(&["no_change", "add", "delete"]),
    },
    OptionSpec {
        name: "tile_ground",
        kind: OptionKind::Choice(&["no_change", "1", "2", "3"]),
    },
    OptionSpec { name: "invisible_mesh_cull", kind: YES_NO },
    OptionSpec { name: "map_aabb_material", kind: YES_NO },
    OptionSpec { name: "allow_split", kind: YES_NO },
    OptionSpec { name: "do_water", kind: YES_NO },
    OptionSpec { name: "merge_by_bitmap", kind: YES_NO },
    OptionSpec { name: "placeable_with_transparency", kind: YES_NO },
    OptionSpec { name: "force_white", kind: YES_NO },
    OptionSpec {
        name: "splotch",
        kind: OptionKind::Toggle { on: "animate", off: "ignore" },
    },
    OptionSpec { name: "water_key", kind: OptionKind::Text },
    OptionSpec { name: "ground_key", kind: OptionKind::Text },
    OptionSpec { name: "splotch_key", kind: OptionKind::Text },
    OptionSpec { name: "foliage_key", kind: OptionKind::Text },
    OptionSpec { name: "transparency_key", kind: OptionKind::Text },
    OptionSpec { name: "min_Size", kind: OptionKind::Integer },
    OptionSpec { name: "map_aabb_from", kind: OptionKind::Integer },
    OptionSpec { name: "map_aabb_to", kind: OptionKind::Integer },
    OptionSpec { name: "tile_raise_amount", kind: OptionKind::Float },
    OptionSpec { name: "wave_height", kind: OptionKind::Float },
    OptionSpec { name: "rescaleXYZ", kind: OptionKind::Rescale },
];

/// Look up a user option by its exact name.
pub fn find_option(name: &str) -> Option<&'static OptionSpec> {
    USER_OPTIONS.iter().find(|spec| spec.name == name)
}

/// Quote a name unless it is a plain Prolog atom (`[a-z][A-Za-z0-9_]*`).
pub fn quote_atom(name: &str) -> Cow<'_, str> {
    let plain = name.starts_with(|c: char| c.is_ascii_lowercase())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("'{}'", name.replace('\'', "''")))
    }
}

/// Scale factors applied by the tool to every model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rescale {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Rescale {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

impl Rescale {
    pub fn uniform(factor: f64) -> Self {
        Self {
            x: factor,
            y: factor,
            z: factor,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.x == 1.0 && self.y == 1.0 && self.z == 1.0
    }

    /// Decode the stored token. `no` and anything unreadable mean identity.
    pub fn from_token(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == "no" {
            return Self::default();
        }
        let inner = raw.trim_start_matches('[').trim_end_matches(']');
        let mut parts = inner.split(',').map(|p| p.trim().parse::<f64>().ok());
        match (parts.next(), parts.next(), parts.next()) {
            (Some(Some(x)), Some(Some(y)), Some(Some(z))) => Self { x, y, z },
            _ => Self::default(),
        }
    }

    /// Encode as the tool expects: `no` for identity, otherwise `[x,y,z]`.
    pub fn to_token(&self) -> String {
        if self.is_identity() {
            return "no".to_string();
        }
        format!(
            "[{},{},{}]",
            format_significant(self.x, 4),
            format_significant(self.y, 4),
            format_significant(self.z, 4)
        )
    }
}

/// Print a number with at most `digits` significant digits, trailing zeros removed.
///
/// Matches printf's `%g`: plain notation for exponents in `-4..digits`,
/// scientific notation (`1.5e+04`) outside that range. Ties round away from
/// zero (`1.0625` gives `1.063`).
pub fn format_significant(value: f64, digits: usize) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{}", if value == 0.0 { 0.0 } else { value });
    }
    let digits = digits.clamp(1, 15) as i32;
    let magnitude = value.abs();
    let mut exponent = magnitude.log10().floor() as i32;
    let mut mantissa = round_to_digits(magnitude, digits, exponent);
    // log10 may be one off right below a power of ten
    if mantissa < 10f64.powi(digits - 1) {
        exponent -= 1;
        mantissa = round_to_digits(magnitude, digits, exponent);
    }
    // 9.9996 rounds up into an extra digit
    if mantissa >= 10f64.powi(digits) {
        exponent += 1;
        mantissa = (mantissa / 10.0).round();
    }

    let sign = if value < 0.0 { "-" } else { "" };
    let mantissa_digits = format!("{}", mantissa as u64);

    if exponent < -4 || exponent >= digits {
        let (lead, rest) = mantissa_digits.split_at(1);
        let mantissa = trim_fraction(&format!("{}.{}", lead, rest)).to_string();
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        format!("{}{}e{}{:02}", sign, mantissa, exp_sign, exponent.abs())
    } else {
        let decimals = (digits - 1 - exponent) as usize;
        let plain = if decimals == 0 {
            mantissa_digits
        } else if decimals >= mantissa_digits.len() {
            format!(
                "0.{}{}",
                "0".repeat(decimals - mantissa_digits.len()),
                mantissa_digits
            )
        } else {
            let (whole, fraction) = mantissa_digits.split_at(mantissa_digits.len() - decimals);
            format!("{}.{}", whole, fraction)
        };
        format!("{}{}", sign, trim_fraction(&plain))
    }
}

/// `magnitude` scaled so `digits` significant digits sit left of the point, rounded.
fn round_to_digits(magnitude: f64, digits: i32, exponent: i32) -> f64 {
    let shift = digits - 1 - exponent;
    if shift >= 0 {
        (magnitude * 10f64.powi(shift)).round()
    } else {
        (magnitude / 10f64.powi(-shift)).round()
    }
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

/// Typed value of one user option.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Choice(usize),
    Toggle(bool),
    Text(String),
    Integer(i64),
    Float(f64),
    Rescale(Rescale),
}

impl OptionSpec {
    /// Name as written inside `g_user_option(...)`; names that are not plain atoms get quoted.
    pub fn assertion_name(&self) -> Cow<'static, str> {
        quote_atom(self.name)
    }

    pub fn config_key(&self) -> ConfigKey {
        ConfigKey::user(self.name)
    }

    pub fn default_value(&self) -> OptionValue {
        match self.kind {
            OptionKind::Choice(_) => OptionValue::Choice(0),
            OptionKind::Toggle { .. } => OptionValue::Toggle(false),
            OptionKind::Text => OptionValue::Text(String::new()),
            OptionKind::Integer => OptionValue::Integer(0),
            OptionKind::Float => OptionValue::Float(0.0),
            OptionKind::Rescale => OptionValue::Rescale(Rescale::default()),
        }
    }

    /// Decode a token read from the configuration file.
    ///
    /// Never fails: unknown choice tokens select ordinal 0 and unreadable
    /// numbers decode as zero.
    pub fn decode(&self, raw: &str) -> OptionValue {
        match self.kind {
            OptionKind::Choice(tokens) => {
                OptionValue::Choice(tokens.iter().position(|t| *t == raw).unwrap_or(0))
            }
            OptionKind::Toggle { on, .. } => OptionValue::Toggle(raw == on),
            OptionKind::Text => OptionValue::Text(raw.to_string()),
            OptionKind::Integer => OptionValue::Integer(raw.trim().parse().unwrap_or(0)),
            OptionKind::Float => OptionValue::Float(raw.trim().parse().unwrap_or(0.0)),
            OptionKind::Rescale => OptionValue::Rescale(Rescale::from_token(raw)),
        }
    }

    /// Encode a value as the token written to the configuration file.
    pub fn encode(&self, value: &OptionValue) -> String {
        match (self.kind, value) {
            (OptionKind::Choice(tokens), OptionValue::Choice(ordinal)) => {
                tokens.get(*ordinal).unwrap_or(&tokens[0]).to_string()
            }
            (OptionKind::Toggle { on, off }, OptionValue::Toggle(enabled)) => {
                if *enabled { on } else { off }.to_string()
            }
            (OptionKind::Rescale, OptionValue::Rescale(rescale)) => rescale.to_token(),
            (_, OptionValue::Text(text)) => text.clone(),
            (_, OptionValue::Integer(n)) => n.to_string(),
            (_, OptionValue::Float(n)) => n.to_string(),
            // Mismatched kinds fall back to the default token
            _ => self.encode(&self.default_value()),
        }
    }

    /// Parse a value typed by the user. Unlike [`decode`](Self::decode) this rejects
    /// anything outside the option's vocabulary.
    pub fn parse(&self, input: &str) -> Result<OptionValue, OptionError> {
        let input = input.trim();
        match self.kind {
            OptionKind::Choice(tokens) => tokens
                .iter()
                .position(|t| *t == input)
                .map(OptionValue::Choice)
                .ok_or_else(|| OptionError::InvalidToken {
                    option: self.name.to_string(),
                    value: input.to_string(),
                    allowed: tokens.join(", "),
                }),
            OptionKind::Toggle { on, off } => {
                let lowered = input.to_ascii_lowercase();
                if input == on || matches!(lowered.as_str(), "yes" | "on" | "true" | "1") {
                    Ok(OptionValue::Toggle(true))
                } else if input == off || matches!(lowered.as_str(), "no" | "off" | "false" | "0")
                {
                    Ok(OptionValue::Toggle(false))
                } else {
                    Err(OptionError::InvalidToken {
                        option: self.name.to_string(),
                        value: input.to_string(),
                        allowed: format!("{}, {}", on, off),
                    })
                }
            }
            OptionKind::Text => {
                if input.contains(['\n', '\r']) {
                    Err(OptionError::InvalidValue {
                        option: self.name.to_string(),
                        reason: "value must be a single line".to_string(),
                    })
                } else {
                    Ok(OptionValue::Text(input.to_string()))
                }
            }
            OptionKind::Integer => input
                .parse()
                .map(OptionValue::Integer)
                .map_err(|_| self.invalid_number(input)),
            OptionKind::Float => match input.parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(OptionValue::Float(n)),
                _ => Err(self.invalid_number(input)),
            },
            OptionKind::Rescale => self.parse_rescale(input),
        }
    }

    fn parse_rescale(&self, input: &str) -> Result<OptionValue, OptionError> {
        if input == "no" {
            return Ok(OptionValue::Rescale(Rescale::default()));
        }
        let inner = input.trim_start_matches('[').trim_end_matches(']');
        let factors = inner
            .split(',')
            .map(|part| match part.trim().parse::<f64>() {
                Ok(n) if n.is_finite() && n > 0.0 => Ok(n),
                _ => Err(self.invalid_number(part.trim())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        match factors.as_slice() {
            // A single factor scales uniformly, like the locked rescale control
            [factor] => Ok(OptionValue::Rescale(Rescale::uniform(*factor))),
            [x, y, z] => Ok(OptionValue::Rescale(Rescale {
                x: *x,
                y: *y,
                z: *z,
            })),
            _ => Err(OptionError::InvalidValue {
                option: self.name.to_string(),
                reason: "expected one factor or three comma-separated factors".to_string(),
            }),
        }
    }

    fn invalid_number(&self, value: &str) -> OptionError {
        OptionError::InvalidNumber {
            option: self.name.to_string(),
            value: value.to_string(),
        }
    }
}

/// In-memory settings mirrored from the configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanOptions {
    core: IndexMap<CoreKey, String>,
    user: IndexMap<&'static str, OptionValue>,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            core: CoreKey::ALL
                .into_iter()
                .map(|key| (key, String::new()))
                .collect(),
            user: USER_OPTIONS
                .iter()
                .map(|spec| (spec.name, spec.default_value()))
                .collect(),
        }
    }
}

impl CleanOptions {
    /// Apply one loaded fact. Returns false when the key is not recognized.
    pub fn apply(&mut self, key: &ConfigKey, raw: &str) -> bool {
        match key {
            ConfigKey::Core(predicate) => match CoreKey::from_predicate(predicate) {
                Some(core) => {
                    self.core.insert(core, raw.to_string());
                    true
                }
                None => false,
            },
            ConfigKey::User(name) => match find_option(name) {
                Some(spec) => {
                    self.user.insert(spec.name, spec.decode(raw));
                    true
                }
                None => false,
            },
        }
    }

    pub fn core(&self, key: CoreKey) -> &str {
        self.core.get(&key).map(String::as_str).unwrap_or_default()
    }

    pub fn set_core(&mut self, key: CoreKey, value: impl Into<String>) {
        self.core.insert(key, value.into());
    }

    pub fn in_dir(&self) -> &str {
        self.core(CoreKey::InDir)
    }

    pub fn pattern(&self) -> &str {
        self.core(CoreKey::Pattern)
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.user.get(name)
    }

    /// Store a value for a catalogued option. Unknown names are ignored.
    pub fn set(&mut self, name: &str, value: OptionValue) -> bool {
        match find_option(name) {
            Some(spec) => {
                self.user.insert(spec.name, value);
                true
            }
            None => false,
        }
    }

    /// Current token of a user option, as it would be written to the file.
    pub fn token(&self, name: &str) -> Option<String> {
        let spec = find_option(name)?;
        self.user.get(spec.name).map(|value| spec.encode(value))
    }

    /// All facts in catalogue order, as (key, token) pairs.
    pub fn entries(&self) -> Vec<(ConfigKey, String)> {
        let core = self
            .core
            .iter()
            .map(|(key, value)| (key.config_key(), value.clone()));
        let user = USER_OPTIONS.iter().filter_map(|spec| {
            self.user
                .get(spec.name)
                .map(|value| (spec.config_key(), spec.encode(value)))
        });
        core.chain(user).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_names_unique() {
        let mut names: Vec<_> = USER_OPTIONS.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), USER_OPTIONS.len());
    }

    #[test]
    fn test_choice_reverse_lookup() {
        let spec = find_option("classification").unwrap();
        assert_eq!(spec.decode("character"), OptionValue::Choice(1));
        assert_eq!(spec.decode("door"), OptionValue::Choice(2));
        assert_eq!(spec.decode("tile"), OptionValue::Choice(5));
        // Unknown tokens select the automatic default
        assert_eq!(spec.decode("spaceship"), OptionValue::Choice(0));
        assert_eq!(spec.encode(&OptionValue::Choice(0)), "automatic");
    }

    #[test]
    fn test_choice_round_trip_all_tokens() {
        for spec in USER_OPTIONS {
            if let OptionKind::Choice(tokens) = spec.kind {
                for token in tokens {
                    assert_eq!(spec.encode(&spec.decode(token)), *token, "{}", spec.name);
                }
            }
        }
    }

    #[test]
    fn test_toggle_tokens() {
        let splotch = find_option("splotch").unwrap();
        assert_eq!(splotch.decode("animate"), OptionValue::Toggle(true));
        assert_eq!(splotch.decode("yes"), OptionValue::Toggle(false));
        assert_eq!(splotch.encode(&OptionValue::Toggle(false)), "ignore");

        let cull = find_option("invisible_mesh_cull").unwrap();
        assert_eq!(cull.parse("on").unwrap(), OptionValue::Toggle(true));
        assert_eq!(cull.encode(&OptionValue::Toggle(true)), "yes");
        assert!(cull.parse("maybe").is_err());
    }

    #[test]
    fn test_rescale_tokens() {
        let rescale = Rescale::from_token("[2,1,1]");
        assert_eq!(rescale, Rescale { x: 2.0, y: 1.0, z: 1.0 });
        assert_eq!(rescale.to_token(), "[2,1,1]");

        assert_eq!(Rescale::from_token("no"), Rescale::default());
        assert_eq!(Rescale::uniform(1.0).to_token(), "no");
        assert_eq!(Rescale { x: 0.5, y: 1.25, z: 3.0 }.to_token(), "[0.5,1.25,3]");
    }

    #[test]
    fn test_rescale_parse_from_user() {
        let spec = find_option("rescaleXYZ").unwrap();
        assert_eq!(
            spec.parse("2").unwrap(),
            OptionValue::Rescale(Rescale::uniform(2.0))
        );
        assert_eq!(
            spec.parse("[1.5, 1, 2]").unwrap(),
            OptionValue::Rescale(Rescale { x: 1.5, y: 1.0, z: 2.0 })
        );
        assert!(spec.parse("1,2").is_err());
        assert!(spec.parse("0,1,1").is_err());
    }

    #[test]
    fn test_format_significant() {
        assert_eq!(format_significant(2.0, 4), "2");
        assert_eq!(format_significant(1.23456, 4), "1.235");
        assert_eq!(format_significant(0.5, 4), "0.5");
        assert_eq!(format_significant(123.44, 4), "123.4");
        assert_eq!(format_significant(12345.0, 4), "1.235e+04");
        assert_eq!(format_significant(0.00001, 4), "1e-05");
        assert_eq!(format_significant(0.0, 4), "0");
        assert_eq!(format_significant(-2.5, 4), "-2.5");
        assert_eq!(format_significant(9.99996, 4), "10");
        assert_eq!(format_significant(0.001, 4), "0.001");
    }

    #[test]
    fn test_format_significant_rounds_ties_up() {
        assert_eq!(format_significant(1.0625, 4), "1.063");
        assert_eq!(format_significant(0.03125, 4), "0.03125");
        assert_eq!(format_significant(0.5, 1), "0.5");
        assert_eq!(format_significant(2.5, 1), "3");
        assert_eq!(
            Rescale { x: 1.0625, y: 2.5, z: 0.03125 }.to_token(),
            "[1.063,2.5,0.03125]"
        );
    }

    #[test]
    fn test_core_value_must_be_one_line() {
        assert_eq!(CoreKey::InDir.parse("models/in"), Ok("models/in"));
        assert!(matches!(
            CoreKey::InDir.parse("a\nb"),
            Err(OptionError::InvalidValue { .. })
        ));
        assert!(CoreKey::Pattern.parse("*.mdl\r").is_err());
    }

    #[test]
    fn test_assertion_name_quoting() {
        assert_eq!(find_option("snap").unwrap().assertion_name(), "snap");
        assert_eq!(
            find_option("pivots_below_z=0").unwrap().assertion_name(),
            "'pivots_below_z=0'"
        );
    }

    #[test]
    fn test_parse_rejects_unknown_choice() {
        let spec = find_option("snap").unwrap();
        let err = spec.parse("coarse").unwrap_err();
        assert!(matches!(err, OptionError::InvalidToken { .. }));
        assert!(err.to_string().contains("binary"));
    }

    #[test]
    fn test_numeric_decode_is_lenient() {
        let spec = find_option("min_Size").unwrap();
        assert_eq!(spec.decode("12"), OptionValue::Integer(12));
        assert_eq!(spec.decode("lots"), OptionValue::Integer(0));
        assert!(spec.parse("lots").is_err());

        let wave = find_option("wave_height").unwrap();
        assert_eq!(wave.encode(&wave.decode("0.5")), "0.5");
    }

    #[test]
    fn test_clean_options_apply() {
        let mut options = CleanOptions::default();
        assert!(options.apply(&ConfigKey::core("g_indir"), "models/in"));
        assert!(options.apply(&ConfigKey::user("snap"), "fine"));
        assert!(!options.apply(&ConfigKey::user("not_an_option"), "x"));
        assert!(!options.apply(&ConfigKey::core("g_unknown"), "x"));

        assert_eq!(options.in_dir(), "models/in");
        assert_eq!(options.get("snap"), Some(&OptionValue::Choice(3)));
        assert_eq!(options.token("snap").as_deref(), Some("fine"));
    }

    #[test]
    fn test_core_aliases() {
        assert_eq!(CoreKey::from_alias("indir"), Some(CoreKey::InDir));
        assert_eq!(CoreKey::from_alias("g_small_log"), Some(CoreKey::SummaryLog));
        assert_eq!(CoreKey::from_alias("classification"), None);
    }

    #[test]
    fn test_entries_cover_catalogue() {
        let options = CleanOptions::default();
        let entries = options.entries();
        assert_eq!(entries.len(), CoreKey::ALL.len() + USER_OPTIONS.len());
        assert!(entries.contains(&(ConfigKey::user("rescaleXYZ"), "no".to_string())));
    }
}
