use crate::{
    error::ServiceError,
    odata::{
        entity::{parse_count_body, parse_entity_page},
        metadata::{ServiceMetadata, parse_metadata},
        service::ODataService,
    },
    request::EntityQuery,
};
use async_trait::async_trait;
use model::records::row::RowHandle;
use reqwest::{Client, Response, Url};
use std::{sync::Arc, time::Duration};
use tokio::sync::OnceCell;
use tracing::debug;

/// Longest error body kept in `ServiceError::Http`.
const MAX_ERROR_BODY: usize = 512;

/// OData v2 service reached over HTTP.
#[derive(Clone)]
pub struct HttpODataService {
    http: Client,
    base: Url,
    /// `$metadata` is fetched once and shared by all clones.
    metadata: Arc<OnceCell<ServiceMetadata>>,
}

impl HttpODataService {
    pub fn connect(url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("parlfetch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_client(http, url)
    }

    pub fn with_client(http: Client, url: &str) -> Result<Self, ServiceError> {
        // Relative joins only append to a base that ends with '/'
        let normalized = if url.ends_with('/') {
            url.to_string()
        } else {
            format!("{url}/")
        };
        let base = Url::parse(&normalized)
            .map_err(|e| ServiceError::InvalidUrl(format!("{url}: {e}")))?;

        Ok(Self {
            http,
            base,
            metadata: Arc::new(OnceCell::new()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        self.base
            .join(path)
            .map_err(|e| ServiceError::InvalidUrl(format!("{path}: {e}")))
    }

    async fn metadata(&self) -> Result<&ServiceMetadata, ServiceError> {
        self.metadata
            .get_or_try_init(|| async {
                let url = self.endpoint("$metadata")?;
                debug!("Loading service metadata from {url}");
                let resp = self.http.get(url.clone()).send().await?;
                let body = check_status(resp, &url).await?.text().await?;
                parse_metadata(&body)
            })
            .await
    }
}

async fn check_status(resp: Response, url: &Url) -> Result<Response, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let mut body = resp.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(ServiceError::http(status.as_u16(), url.as_str(), body))
}

#[async_trait]
impl ODataService for HttpODataService {
    async fn list_tables(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self.metadata().await?.table_names())
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<String>, ServiceError> {
        self.metadata()
            .await?
            .table(table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| ServiceError::UnknownEntitySet(table.to_string()))
    }

    async fn count(&self, query: &EntityQuery) -> Result<usize, ServiceError> {
        let url = self.endpoint(&format!("{}/$count", query.table))?;
        let pairs = query.count_pairs()?;
        debug!("GET {url} {pairs:?}");

        let resp = self.http.get(url.clone()).query(&pairs).send().await?;
        let body = check_status(resp, &url).await?.text().await?;
        parse_count_body(&body)
    }

    async fn fetch(&self, query: &EntityQuery) -> Result<Vec<RowHandle>, ServiceError> {
        let url = self.endpoint(&query.table)?;
        let pairs = query.query_pairs()?;
        debug!("GET {url} {pairs:?}");

        let resp = self
            .http
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&pairs)
            .send()
            .await?;
        let body = check_status(resp, &url).await?.bytes().await?;
        let rows = parse_entity_page(&body)?;

        debug!("Fetched {} rows from {}", rows.len(), query.table);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let service =
            HttpODataService::connect("https://ws.parlament.ch/odata.svc", Duration::from_secs(5))
                .unwrap();
        assert_eq!(service.base_url().as_str(), "https://ws.parlament.ch/odata.svc/");
        assert_eq!(
            service.endpoint("Session/$count").unwrap().as_str(),
            "https://ws.parlament.ch/odata.svc/Session/$count"
        );
    }

    #[test]
    fn rejects_invalid_urls() {
        assert!(matches!(
            HttpODataService::connect("not a url", Duration::from_secs(5)),
            Err(ServiceError::InvalidUrl(_))
        ));
    }
}
