//! Job output files and contact dedup.
//!
//! All jobs share one output directory; `all_emails.txt` and
//! `all_phones.txt` aggregate every contact ever saved there. Seeding the
//! in-memory sets from those files at job start is what makes re-running a
//! job append only contacts it hasn't produced before.
//!
//! Every `record_*` call appends to disk before the caller emits the
//! corresponding event, so an event never references a contact that isn't
//! in its file yet.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use extraction::sanitize_file_name;

pub const ALL_EMAILS_FILE: &str = "all_emails.txt";
pub const ALL_PHONES_FILE: &str = "all_phones.txt";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("listing serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A map-stage business listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub name: String,
    pub niche: String,
    pub city: String,
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

pub struct JobOutput {
    root: PathBuf,
    country: String,
    country_tag: String,
    seen_emails: HashSet<String>,
    seen_phones: HashSet<String>,
    seen_listing_names: HashSet<String>,
    city_listings: HashMap<String, Vec<Listing>>,
    lead_counts: HashMap<String, usize>,
}

impl JobOutput {
    /// Create the output directory if needed and seed the dedup sets from
    /// the aggregate files.
    pub async fn prepare(root: &Path, country: &str) -> Result<Self, OutputError> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| io_err(root, e))?;

        let mut output = Self {
            root: root.to_path_buf(),
            country: country.to_string(),
            country_tag: sanitize_file_name(country),
            seen_emails: HashSet::new(),
            seen_phones: HashSet::new(),
            seen_listing_names: HashSet::new(),
            city_listings: HashMap::new(),
            lead_counts: HashMap::new(),
        };

        for line in output.read_lines(ALL_EMAILS_FILE).await? {
            output.seen_emails.insert(line.to_lowercase());
        }
        for line in output.read_lines(ALL_PHONES_FILE).await? {
            output.seen_phones.insert(line);
        }

        Ok(output)
    }

    pub fn leads_file_name(&self, city: &str) -> String {
        format!("{}_{}_leads.txt", self.country_tag, sanitize_file_name(city))
    }

    pub fn email_file_name(&self, city: &str) -> String {
        format!("{}_{}_emails.txt", self.country_tag, sanitize_file_name(city))
    }

    pub fn phone_file_name(&self) -> String {
        format!("{}_phones.txt", self.country_tag)
    }

    /// Append a result entry to the city's leads file. Returns the running
    /// count of entries this job saved to that file.
    pub async fn record_lead(
        &mut self,
        city: &str,
        niche: &str,
        site: &str,
        title: &str,
        detail: &str,
        link: &str,
    ) -> Result<usize, OutputError> {
        let file_name = self.leads_file_name(city);
        let path = self.root.join(&file_name);

        if !self.lead_counts.contains_key(&file_name) {
            let exists = tokio::fs::try_exists(&path)
                .await
                .map_err(|e| io_err(&path, e))?;
            if !exists {
                let header = format!("--- LEADS FOR {}, {} ---\n\n", city, self.country);
                tokio::fs::write(&path, header)
                    .await
                    .map_err(|e| io_err(&path, e))?;
            }
        }

        let entry = format!(
            "[RESULT] [{}] - {} [{}]\nTitle: {}\nDetails: {}\nLink: {}\n{}\n",
            niche.to_uppercase(),
            city,
            site,
            title,
            detail,
            link,
            "-".repeat(50)
        );
        self.append(&file_name, &entry).await?;

        let count = self.lead_counts.entry(file_name).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    /// Record a first-seen email (compared lowercase). Appends to the city
    /// email file and the aggregate; returns false if already known.
    pub async fn record_email(&mut self, city: &str, email: &str) -> Result<bool, OutputError> {
        let key = email.to_lowercase();
        if !self.seen_emails.insert(key) {
            return Ok(false);
        }
        let line = format!("{email}\n");
        let city_file = self.email_file_name(city);
        self.append(&city_file, &line).await?;
        self.append(ALL_EMAILS_FILE, &line).await?;
        Ok(true)
    }

    /// Record a first-seen phone. Appends to the country phone file and the
    /// aggregate; returns false if already known.
    pub async fn record_phone(&mut self, phone: &str) -> Result<bool, OutputError> {
        if !self.seen_phones.insert(phone.to_string()) {
            return Ok(false);
        }
        let line = format!("{phone}\n");
        let phone_file = self.phone_file_name();
        self.append(&phone_file, &line).await?;
        self.append(ALL_PHONES_FILE, &line).await?;
        Ok(true)
    }

    /// Exact-name listing dedup (case-insensitive), job-wide.
    pub fn is_new_listing(&mut self, name: &str) -> bool {
        self.seen_listing_names.insert(name.to_lowercase())
    }

    pub fn city_listing_count(&self, city: &str) -> usize {
        self.city_listings.get(city).map_or(0, Vec::len)
    }

    pub fn add_listing(&mut self, listing: Listing) {
        self.city_listings
            .entry(listing.city.clone())
            .or_default()
            .push(listing);
    }

    /// Rewrite the city's listing snapshot (JSON) and cumulative CSV.
    /// Returns `(csv_name, json_name, rows)`, or None if the city has no
    /// listings yet.
    pub async fn flush_city_listings(
        &mut self,
        city: &str,
    ) -> Result<Option<(String, String, usize)>, OutputError> {
        let Some(listings) = self.city_listings.get(city) else {
            return Ok(None);
        };
        if listings.is_empty() {
            return Ok(None);
        }

        let city_tag = sanitize_file_name(city);
        let json_name = format!("{}_{}_listings.json", self.country_tag, city_tag);
        let csv_name = format!("{}_{}_listings.csv", self.country_tag, city_tag);

        let json_path = self.root.join(&json_name);
        let json = serde_json::to_vec_pretty(listings)?;
        tokio::fs::write(&json_path, json)
            .await
            .map_err(|e| io_err(&json_path, e))?;

        let mut csv = String::from("name,niche,city,phone,email,link\n");
        for listing in listings {
            csv.push_str(&format!(
                "{},{},{},{},{},{}\n",
                csv_field(&listing.name),
                csv_field(&listing.niche),
                csv_field(&listing.city),
                csv_field(listing.phone.as_deref().unwrap_or("")),
                csv_field(listing.email.as_deref().unwrap_or("")),
                csv_field(&listing.link),
            ));
        }
        let csv_path = self.root.join(&csv_name);
        tokio::fs::write(&csv_path, csv)
            .await
            .map_err(|e| io_err(&csv_path, e))?;

        Ok(Some((csv_name, json_name, listings.len())))
    }

    /// The job's downloadable files: everything in the output directory
    /// carrying this job's country tag, plus the aggregates.
    pub async fn file_list(&self) -> Result<Vec<String>, OutputError> {
        let mut names = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| io_err(&self.root, e))?;
        while let Some(entry) = dir.next_entry().await.map_err(|e| io_err(&self.root, e))? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(&format!("{}_", self.country_tag))
                || name == ALL_EMAILS_FILE
                || name == ALL_PHONES_FILE
            {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn append(&self, file_name: &str, content: &str) -> Result<(), OutputError> {
        use tokio::io::AsyncWriteExt;

        let path = self.root.join(file_name);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| io_err(&path, e))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| io_err(&path, e))?;
        Ok(())
    }

    async fn read_lines(&self, file_name: &str) -> Result<Vec<String>, OutputError> {
        let path = self.root.join(file_name);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(io_err(&path, e)),
        }
    }
}

fn io_err(path: &Path, source: std::io::Error) -> OutputError {
    OutputError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn output(dir: &Path) -> JobOutput {
        JobOutput::prepare(dir, "United Kingdom").await.unwrap()
    }

    #[tokio::test]
    async fn email_dedup_within_a_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = output(dir.path()).await;

        assert!(out.record_email("London", "jane@x.com").await.unwrap());
        assert!(!out.record_email("London", "JANE@X.COM").await.unwrap());

        let all = tokio::fs::read_to_string(dir.path().join(ALL_EMAILS_FILE))
            .await
            .unwrap();
        assert_eq!(all, "jane@x.com\n");
    }

    #[tokio::test]
    async fn aggregate_file_seeds_dedup_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(ALL_EMAILS_FILE), "jane@x.com\n")
            .await
            .unwrap();

        let mut out = output(dir.path()).await;
        assert!(!out.record_email("London", "jane@x.com").await.unwrap());
        assert!(out.record_email("London", "new@x.com").await.unwrap());

        let all = tokio::fs::read_to_string(dir.path().join(ALL_EMAILS_FILE))
            .await
            .unwrap();
        assert_eq!(all, "jane@x.com\nnew@x.com\n");
    }

    #[tokio::test]
    async fn phone_files_receive_each_number_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = output(dir.path()).await;

        assert!(out.record_phone("+447911123456").await.unwrap());
        assert!(!out.record_phone("+447911123456").await.unwrap());

        let country = tokio::fs::read_to_string(dir.path().join("United_Kingdom_phones.txt"))
            .await
            .unwrap();
        assert_eq!(country, "+447911123456\n");
    }

    #[tokio::test]
    async fn leads_file_gets_header_once_and_counts_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = output(dir.path()).await;

        let first = out
            .record_lead("London", "Yoga", "instagram.com", "A", "d", "http://a")
            .await
            .unwrap();
        let second = out
            .record_lead("London", "Yoga", "instagram.com", "B", "d", "http://b")
            .await
            .unwrap();
        assert_eq!((first, second), (1, 2));

        let content =
            tokio::fs::read_to_string(dir.path().join("United_Kingdom_London_leads.txt"))
                .await
                .unwrap();
        assert!(content.starts_with("--- LEADS FOR London, United Kingdom ---\n\n"));
        assert_eq!(content.matches("[RESULT]").count(), 2);
        assert_eq!(content.matches("--- LEADS FOR").count(), 1);
    }

    #[tokio::test]
    async fn listing_snapshot_and_csv_are_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = output(dir.path()).await;

        assert!(out.is_new_listing("Iron Gym"));
        assert!(!out.is_new_listing("iron gym"));

        out.add_listing(Listing {
            name: "Iron Gym".to_string(),
            niche: "Gym".to_string(),
            city: "London".to_string(),
            link: "http://maps/iron".to_string(),
            phone: Some("+447911123456".to_string()),
            email: None,
        });

        let (csv_name, json_name, rows) = out
            .flush_city_listings("London")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(csv_name, "United_Kingdom_London_listings.csv");

        let csv = tokio::fs::read_to_string(dir.path().join(&csv_name))
            .await
            .unwrap();
        assert!(csv.starts_with("name,niche,city,phone,email,link\n"));
        assert!(csv.contains("Iron Gym,Gym,London,+447911123456,,http://maps/iron"));

        let json = tokio::fs::read_to_string(dir.path().join(&json_name))
            .await
            .unwrap();
        assert!(json.contains("\"Iron Gym\""));

        assert!(out.flush_city_listings("Leeds").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_list_is_scoped_to_country_and_aggregates() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("France_Paris_leads.txt"), "x")
            .await
            .unwrap();

        let mut out = output(dir.path()).await;
        out.record_email("London", "jane@x.com").await.unwrap();

        let files = out.file_list().await.unwrap();
        assert!(files.contains(&ALL_EMAILS_FILE.to_string()));
        assert!(files.contains(&"United_Kingdom_London_emails.txt".to_string()));
        assert!(!files.iter().any(|f| f.starts_with("France_")));
    }

    #[test]
    fn csv_fields_are_escaped() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
