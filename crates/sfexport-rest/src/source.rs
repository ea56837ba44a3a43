//! Record query and body fetch over the REST API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use sfexport_core::schema::ATTACHMENT_FIELDS;
use sfexport_core::{
    ApiVersion, BodySource, ByteStream, Credential, PageRequest, Record, RecordSource, Result,
};

use crate::client::RestClient;
use crate::soql::{SObjectName, build_page_query};

/// Query endpoint response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    total_size: u64,
    #[serde(default = "default_done")]
    done: bool,
    #[serde(default)]
    records: Vec<Map<String, Value>>,
    next_records_url: Option<String>,
}

fn default_done() -> bool {
    true
}

/// REST implementation of the query and body endpoints for one object type.
#[derive(Debug, Clone)]
pub struct RestApi {
    client: RestClient,
    api_version: ApiVersion,
    sobject: SObjectName,
}

impl RestApi {
    /// Create an API handle for `sobject` at `api_version`.
    pub fn new(client: RestClient, api_version: ApiVersion, sobject: SObjectName) -> Self {
        Self {
            client,
            api_version,
            sobject,
        }
    }

    /// Returns the object type this handle exports.
    pub fn sobject(&self) -> &SObjectName {
        &self.sobject
    }

    fn body_path(&self, record: &Record) -> String {
        format!("sobjects/{}/{}/Body", self.sobject, record.id)
    }
}

#[async_trait]
impl RecordSource for RestApi {
    #[instrument(skip(self, credential, request), fields(sobject = %self.sobject, limit = request.limit))]
    async fn query_page(
        &self,
        credential: &Credential,
        request: &PageRequest,
    ) -> Result<Vec<Record>> {
        let soql = build_page_query(&self.sobject, &ATTACHMENT_FIELDS, request);
        debug!(%soql, "Running page query");

        let url = credential.instance_url().data_url(&self.api_version, "query/");
        let response: QueryResponse = self
            .client
            .get_json(credential, &url, &[("q", soql.as_str())])
            .await?;

        if !response.done || response.next_records_url.is_some() {
            // The next page query resumes after the last record we got.
            debug!(
                total_size = response.total_size,
                "Query result was split, continuing from the cursor"
            );
        }

        response.records.into_iter().map(Record::from_fields).collect()
    }
}

#[async_trait]
impl BodySource for RestApi {
    #[instrument(skip(self, credential, record), fields(id = %record.id))]
    async fn open_body(&self, credential: &Credential, record: &Record) -> Result<ByteStream> {
        let url = credential
            .instance_url()
            .data_url(&self.api_version, &self.body_path(record));
        self.client.get_stream(credential, &url).await
    }
}
