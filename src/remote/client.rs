use crate::config::{Config, ServerConfig};
use crate::remote::api_types::{ApiListResponse, RemoteJob};
use crate::remote::{JobPayload, ListOptions, ListPage, RemoteCollection};
use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

/// Page size used when the whole result set is wanted.
const FULL_LIST_BATCH: u32 = 500;

/// HTTP client for a PocketBase-style records API
#[derive(Clone)]
pub struct CollectionClient {
  http: reqwest::Client,
  records_url: Url,
  token: Option<String>,
}

impl CollectionClient {
  pub fn new(server: &ServerConfig) -> Result<Self> {
    let http = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      records_url: records_url(&server.url, &server.collection)?,
      token: Config::get_api_token(),
    })
  }

  fn request(&self, method: Method, url: Url) -> RequestBuilder {
    let builder = self.http.request(method, url);
    match &self.token {
      Some(token) => builder.header(reqwest::header::AUTHORIZATION, token),
      None => builder,
    }
  }

  fn list_url(&self, page: u32, per_page: u32, options: &ListOptions) -> Url {
    let mut url = self.records_url.clone();
    {
      let mut query = url.query_pairs_mut();
      query.append_pair("page", &page.to_string());
      query.append_pair("perPage", &per_page.to_string());
      if let Some(sort) = &options.sort {
        query.append_pair("sort", sort);
      }
      if let Some(filter) = &options.filter {
        query.append_pair("filter", filter);
      }
      if let Some(expand) = &options.expand {
        query.append_pair("expand", expand);
      }
    }
    url
  }

  fn record_url(&self, id: &str) -> Result<Url> {
    let mut url = self.records_url.clone();
    url
      .path_segments_mut()
      .map_err(|_| eyre!("Invalid records URL {}", self.records_url))?
      .push(id);
    Ok(url)
  }

  async fn fetch_page(&self, page: u32, per_page: u32, options: &ListOptions) -> Result<ApiListResponse> {
    let response = self
      .request(Method::GET, self.list_url(page, per_page, options))
      .send()
      .await
      .map_err(|e| eyre!("Failed to list records (page {}): {}", page, e))?;

    read_json(response).await
  }
}

#[async_trait]
impl RemoteCollection for CollectionClient {
  async fn count(&self, filter: Option<&str>) -> Result<u64> {
    let options = ListOptions {
      filter: filter.map(String::from),
      ..ListOptions::default()
    };
    let page = self.fetch_page(1, 1, &options).await?;
    Ok(page.total_items)
  }

  async fn list(&self, page: u32, per_page: u32, options: &ListOptions) -> Result<ListPage> {
    let response = self.fetch_page(page, per_page, options).await?;

    Ok(ListPage {
      items: response.items.into_iter().map(RemoteJob::from_value).collect(),
      total_items: response.total_items,
      total_pages: response.total_pages,
    })
  }

  async fn list_all(&self, options: &ListOptions) -> Result<Vec<RemoteJob>> {
    let first = self.fetch_page(1, FULL_LIST_BATCH, options).await?;
    let total_pages = first.total_pages;
    let mut items = first.items;

    if total_pages > 1 {
      let rest = futures::future::try_join_all(
        (2..=total_pages).map(|page| self.fetch_page(page, FULL_LIST_BATCH, options)),
      )
      .await?;
      for page in rest {
        items.extend(page.items);
      }
    }

    Ok(items.into_iter().map(RemoteJob::from_value).collect())
  }

  async fn create(&self, payload: &JobPayload) -> Result<RemoteJob> {
    let response = self
      .request(Method::POST, self.records_url.clone())
      .json(payload)
      .send()
      .await
      .map_err(|e| eyre!("Failed to create record: {}", e))?;

    let value: Value = read_json(response).await?;
    Ok(RemoteJob::from_value(value))
  }

  async fn update(&self, id: &str, payload: &JobPayload) -> Result<RemoteJob> {
    let response = self
      .request(Method::PATCH, self.record_url(id)?)
      .json(payload)
      .send()
      .await
      .map_err(|e| eyre!("Failed to update record {}: {}", id, e))?;

    let value: Value = read_json(response).await?;
    Ok(RemoteJob::from_value(value))
  }

  async fn delete(&self, id: &str) -> Result<()> {
    let response = self
      .request(Method::DELETE, self.record_url(id)?)
      .send()
      .await
      .map_err(|e| eyre!("Failed to delete record {}: {}", id, e))?;

    ensure_success(response).await?;
    Ok(())
  }
}

/// Build `<base>/api/collections/<collection>/records`.
fn records_url(base: &str, collection: &str) -> Result<Url> {
  let mut url =
    Url::parse(base).map_err(|e| eyre!("Invalid server URL {}: {}", base, e))?;
  url
    .path_segments_mut()
    .map_err(|_| eyre!("Server URL cannot be a base: {}", base))?
    .pop_if_empty()
    .extend(["api", "collections", collection, "records"]);
  Ok(url)
}

async fn ensure_success(response: Response) -> Result<Response> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }

  let url = response.url().clone();
  let body = response.text().await.unwrap_or_default();
  Err(eyre!("{} returned {}: {}", url.path(), status, body))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
  let response = ensure_success(response).await?;
  response
    .json()
    .await
    .map_err(|e| eyre!("Failed to parse response: {}", e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use mockito::Matcher;
  use serde_json::json;

  fn client_for(base: &str) -> CollectionClient {
    CollectionClient::new(&ServerConfig {
      url: base.to_string(),
      collection: "drukwerken".to_string(),
    })
    .unwrap()
  }

  #[test]
  fn test_records_url_handles_trailing_slash() {
    let url = records_url("https://pb.example.com/", "drukwerken").unwrap();
    assert_eq!(
      url.as_str(),
      "https://pb.example.com/api/collections/drukwerken/records"
    );

    let url = records_url("https://example.com/pb", "drukwerken").unwrap();
    assert_eq!(
      url.as_str(),
      "https://example.com/pb/api/collections/drukwerken/records"
    );
  }

  #[test]
  fn test_list_url_encodes_options() {
    let client = client_for("https://pb.example.com");
    let options = ListOptions {
      sort: Some("-date,-created".into()),
      expand: Some("pers".into()),
      filter: Some(r#"pers = "P1""#.into()),
    };
    let url = client.list_url(2, 150, &options);
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

    assert!(pairs.contains(&("page".into(), "2".into())));
    assert!(pairs.contains(&("perPage".into(), "150".into())));
    assert!(pairs.contains(&("sort".into(), "-date,-created".into())));
    assert!(pairs.contains(&("filter".into(), r#"pers = "P1""#.into())));
    assert!(pairs.contains(&("expand".into(), "pers".into())));
  }

  #[tokio::test]
  async fn test_count_reads_total_items() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/api/collections/drukwerken/records")
      .match_query(Matcher::AllOf(vec![
        Matcher::UrlEncoded("page".into(), "1".into()),
        Matcher::UrlEncoded("perPage".into(), "1".into()),
        Matcher::UrlEncoded("filter".into(), r#"pers = "P1""#.into()),
      ]))
      .with_header("content-type", "application/json")
      .with_body(
        json!({"page": 1, "perPage": 1, "totalItems": 321, "totalPages": 321, "items": []})
          .to_string(),
      )
      .create_async()
      .await;

    let client = client_for(&server.url());
    let total = client.count(Some(r#"pers = "P1""#)).await.unwrap();

    assert_eq!(total, 321);
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_list_maps_items() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
      .mock("GET", "/api/collections/drukwerken/records")
      .match_query(Matcher::Any)
      .with_header("content-type", "application/json")
      .with_body(
        json!({
          "page": 1, "perPage": 50, "totalItems": 2, "totalPages": 1,
          "items": [
            {"id": "a", "order_nr": "100", "pers": "P1"},
            "garbage"
          ]
        })
        .to_string(),
      )
      .create_async()
      .await;

    let client = client_for(&server.url());
    let page = client.list(1, 50, &ListOptions::default()).await.unwrap();

    assert_eq!(page.total_pages, 1);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].id.as_deref(), Some("a"));
    assert!(page.items[1].id.is_none());
  }

  #[tokio::test]
  async fn test_server_error_is_reported() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
      .mock("GET", "/api/collections/drukwerken/records")
      .match_query(Matcher::Any)
      .with_status(500)
      .with_body("boom")
      .create_async()
      .await;

    let client = client_for(&server.url());
    let err = client.count(None).await.unwrap_err();
    assert!(err.to_string().contains("500"));
  }

  #[tokio::test]
  async fn test_delete_hits_record_url() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("DELETE", "/api/collections/drukwerken/records/abc")
      .with_status(204)
      .create_async()
      .await;

    let client = client_for(&server.url());
    client.delete("abc").await.unwrap();
    mock.assert_async().await;
  }
}
