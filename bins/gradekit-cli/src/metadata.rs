// Submission export (YAML) parsing for student lookup
use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// One submission directory and its single submitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionInfo {
    pub submission_dir: String,
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Field {
    #[value(name = "submission_dir")]
    SubmissionDir,
    Id,
    Name,
    Email,
}

impl FromStr for Field {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "submission_dir" => Ok(Field::SubmissionDir),
            "id" | "sid" => Ok(Field::Id),
            "name" => Ok(Field::Name),
            "email" => Ok(Field::Email),
            other => bail!("Unknown field '{}' (expected submission_dir, id, name or email)", other),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::SubmissionDir => "submission_dir",
            Field::Id => "id",
            Field::Name => "name",
            Field::Email => "email",
        };
        f.write_str(name)
    }
}

impl SubmissionInfo {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::SubmissionDir => &self.submission_dir,
            Field::Id => &self.id,
            Field::Name => &self.name,
            Field::Email => &self.email,
        }
    }
}

/// A `field=value` lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub field: Field,
    pub value: String,
}

impl FromStr for Query {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let Some((key, value)) = s.split_once('=') else {
            bail!("Query must look like field=value, got '{}'", s);
        };
        Ok(Query {
            field: key.trim().parse()?,
            value: value.to_string(),
        })
    }
}

impl Query {
    pub fn matches(&self, info: &SubmissionInfo) -> bool {
        info.get(self.field) == self.value
    }
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(rename = ":submitters")]
    submitters: Option<Vec<RawSubmitter>>,
}

#[derive(Debug, Deserialize)]
struct RawSubmitter {
    #[serde(rename = ":sid")]
    sid: Value,
    #[serde(rename = ":name")]
    name: Value,
    #[serde(rename = ":email")]
    email: Value,
}

/// Load the export; top level is a map of submission directory to entry
pub fn parse_metadata(path: &Path) -> Result<Mapping> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Submissions in file order. An entry with no submitters, or more than one,
/// is an error when reached.
pub fn extract_info(metadata: &Mapping) -> impl Iterator<Item = Result<SubmissionInfo>> + '_ {
    metadata.iter().map(|(dir, entry)| -> Result<SubmissionInfo> {
        let submission_dir = scalar(dir);
        let raw: RawEntry = serde_yaml::from_value(entry.clone())
            .with_context(|| format!("Malformed entry for {}", submission_dir))?;

        let submitters = match raw.submitters {
            Some(s) => s,
            None => bail!("Missing submitters in {}", submission_dir),
        };
        let [student] = <[RawSubmitter; 1]>::try_from(submitters).map_err(|s| {
            anyhow::anyhow!(
                "Invalid number of submitters in {}: {}",
                submission_dir,
                s.len()
            )
        })?;

        Ok(SubmissionInfo {
            submission_dir,
            id: scalar(&student.sid),
            name: scalar(&student.name),
            email: scalar(&student.email),
        })
    })
}

/// First submission matching `query`
pub fn lookup(metadata: &Mapping, query: &Query) -> Result<Option<SubmissionInfo>> {
    for info in extract_info(metadata) {
        let info = info?;
        if query.matches(&info) {
            return Ok(Some(info));
        }
    }
    Ok(None)
}

// SIDs are often bare numbers in the export
fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"
submission_001:
  :submitters:
  - :sid: 3031234
    :name: Ada Lovelace
    :email: ada@example.edu
  :score: 9.5
submission_002:
  :submitters:
  - :sid: "s-42"
    :name: Alan Turing
    :email: alan@example.edu
"#;

    fn export(text: &str) -> Mapping {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_extracts_submissions_in_order() {
        let infos: Vec<SubmissionInfo> = extract_info(&export(EXPORT))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].submission_dir, "submission_001");
        assert_eq!(infos[0].id, "3031234");
        assert_eq!(infos[1].name, "Alan Turing");
    }

    #[test]
    fn test_lookup_by_any_field() {
        let metadata = export(EXPORT);
        let by_sid = lookup(&metadata, &"sid=3031234".parse().unwrap()).unwrap().unwrap();
        assert_eq!(by_sid.get(Field::Email), "ada@example.edu");

        let by_email = lookup(&metadata, &"email=alan@example.edu".parse().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(by_email.get(Field::SubmissionDir), "submission_002");

        assert!(lookup(&metadata, &"name=Grace Hopper".parse().unwrap()).unwrap().is_none());
    }

    #[test]
    fn test_rejects_bad_submitter_lists() {
        let missing = export("submission_003:\n  :score: 1\n");
        let err = lookup(&missing, &"id=1".parse().unwrap()).unwrap_err();
        assert!(err.to_string().contains("Missing submitters in submission_003"));

        let group = export(
            "submission_004:\n  :submitters:\n  - {':sid': 1, ':name': a, ':email': a@x}\n  - {':sid': 2, ':name': b, ':email': b@x}\n",
        );
        let err = lookup(&group, &"id=1".parse().unwrap()).unwrap_err();
        assert!(err.to_string().contains("Invalid number of submitters"));
    }

    #[test]
    fn test_query_parsing() {
        assert!("nonsense".parse::<Query>().is_err());
        assert!("grade=10".parse::<Query>().is_err());
        let query: Query = "email=a=b@x".parse().unwrap();
        assert_eq!(query.field, Field::Email);
        assert_eq!(query.value, "a=b@x");
    }

    #[test]
    fn test_parse_metadata_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submission_metadata.yml");
        fs::write(&path, EXPORT).unwrap();
        assert_eq!(parse_metadata(&path).unwrap().len(), 2);
        assert!(parse_metadata(&dir.path().join("missing.yml")).is_err());
    }
}
