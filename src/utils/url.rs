// src/utils/url.rs

//! Endpoint URL builders for the GitHub REST API.

use url::Url;

use crate::error::Result;

/// Builds request URLs relative to a configurable API base.
#[derive(Debug, Clone)]
pub struct ApiUrls {
    base: Url,
}

impl ApiUrls {
    pub fn new(api_base: &str) -> Result<Self> {
        let mut base = Url::parse(api_base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    /// `search/repositories` sorted by stars, 100 per page.
    pub fn search_repositories(&self, query: &str, page: u32) -> Result<String> {
        let mut url = self.endpoint("search/repositories")?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("sort", "stars")
            .append_pair("order", "desc")
            .append_pair("page", &page.to_string())
            .append_pair("per_page", "100");
        Ok(url.into())
    }

    pub fn repository(&self, full_name: &str) -> Result<String> {
        Ok(self.endpoint(&format!("repos/{full_name}"))?.into())
    }

    pub fn languages(&self, full_name: &str) -> Result<String> {
        Ok(self.endpoint(&format!("repos/{full_name}/languages"))?.into())
    }

    pub fn contributors(&self, full_name: &str, page: u32, per_page: usize) -> Result<String> {
        let mut url = self.endpoint(&format!("repos/{full_name}/contributors"))?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &per_page.to_string());
        Ok(url.into())
    }

    pub fn user(&self, login: &str) -> Result<String> {
        Ok(self.endpoint(&format!("users/{login}"))?.into())
    }
}
