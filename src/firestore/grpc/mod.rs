//! gRPC driver for Cloud Firestore
//!
//! Talks to `firestore.googleapis.com` (or the emulator) with the protos
//! compiled by `build.rs`. Every request carries the bearer token from
//! [`Settings`] and the `x-goog-request-params` routing header.

pub mod convert;

#[allow(clippy::all)]
pub(crate) mod proto {
    include!(concat!(env!("OUT_DIR"), "/proto.rs"));
}

use super::aggregate_query::{AggregateField, AggregationType};
use super::document_snapshot::DocumentSnapshot;
use super::driver::{DocumentStream, Driver};
use super::field_value::{expand_paths, Fields};
use super::query::StructuredQuery;
use super::settings::Settings;
use super::write_batch::WriteOperation;
use crate::error::FirestoreError;
use async_stream::try_stream;
use async_trait::async_trait;
use convert::{from_proto_fields, to_proto_fields, to_proto_transform, to_snapshot, to_structured_query};
use proto::google::firestore::v1 as pb;
use proto::google::firestore::v1::firestore_client::FirestoreClient as GrpcClient;
use std::fmt;
use tonic::service::interceptor::InterceptedService;
use tonic::service::Interceptor;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::{Code, Request, Status};

use pb::structured_aggregation_query::aggregation::{Avg, Count, Operator as AggOp, Sum};
use pb::structured_aggregation_query::Aggregation;

/// gRPC interceptor for adding authentication and routing headers
#[derive(Clone)]
pub struct FirestoreInterceptor {
    access_token: Option<String>,
    database_path: String,
}

impl Interceptor for FirestoreInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        if let Some(ref token) = self.access_token {
            let bearer = format!("Bearer {}", token)
                .parse()
                .map_err(|_| Status::unauthenticated("Invalid access token"))?;
            request.metadata_mut().insert("authorization", bearer);
        }

        let routing = format!("database={}", self.database_path.replace('/', "%2F"))
            .parse()
            .map_err(|_| Status::invalid_argument("Invalid resource prefix"))?;
        request.metadata_mut().insert("x-goog-request-params", routing);

        Ok(request)
    }
}

type Client = GrpcClient<InterceptedService<Channel, FirestoreInterceptor>>;

fn status_error(status: Status) -> FirestoreError {
    FirestoreError::from_grpc_status(status.code() as i32, status.message())
}

/// Firestore driver speaking gRPC
#[derive(Clone)]
pub struct GrpcDriver {
    settings: Settings,
    root: String,
    client: Client,
}

impl GrpcDriver {
    /// Connect to the backend described by `settings`
    pub async fn connect(settings: Settings) -> Result<Self, FirestoreError> {
        let mut endpoint = Endpoint::from_shared(settings.endpoint())
            .map_err(|e| FirestoreError::Connection(format!("Invalid endpoint: {}", e)))?
            .timeout(settings.request_timeout)
            .connect_timeout(settings.connect_timeout);

        if settings.ssl_enabled {
            let domain = settings
                .host
                .split(':')
                .next()
                .unwrap_or(&settings.host)
                .to_string();
            let tls = ClientTlsConfig::new().with_webpki_roots().domain_name(domain);
            endpoint = endpoint
                .tls_config(tls)
                .map_err(|e| FirestoreError::Connection(format!("Failed to configure TLS: {}", e)))?;
        }

        let channel = endpoint.connect().await.map_err(|e| {
            FirestoreError::Connection(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(
            target: "firestore_odm::grpc",
            host = %settings.host,
            database = %settings.database_path(),
            "connected"
        );

        let interceptor = FirestoreInterceptor {
            access_token: settings.access_token.clone(),
            database_path: settings.database_path(),
        };
        Ok(Self {
            root: settings.documents_root(),
            client: GrpcClient::with_interceptor(channel, interceptor),
            settings,
        })
    }

    /// Settings this driver was built from
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn resource_name(&self, path: &str) -> String {
        format!("{}/{}", self.root, path)
    }

    fn to_write(&self, operation: WriteOperation) -> pb::Write {
        use pb::write::Operation;

        match operation {
            WriteOperation::Set { path, data } => pb::Write {
                operation: Some(Operation::Update(pb::Document {
                    name: self.resource_name(&path),
                    fields: to_proto_fields(&data),
                    ..Default::default()
                })),
                ..Default::default()
            },
            WriteOperation::Update { path, update } => {
                let field_paths = update
                    .fields
                    .keys()
                    .map(|key| convert::quote_field_path(key))
                    .collect();
                pb::Write {
                    operation: Some(Operation::Update(pb::Document {
                        name: self.resource_name(&path),
                        fields: to_proto_fields(&expand_paths(&update.fields)),
                        ..Default::default()
                    })),
                    update_mask: Some(pb::DocumentMask { field_paths }),
                    update_transforms: update
                        .transforms
                        .iter()
                        .map(|(field, transform)| to_proto_transform(field, transform))
                        .collect(),
                    current_document: Some(pb::Precondition {
                        condition_type: Some(pb::precondition::ConditionType::Exists(true)),
                    }),
                }
            }
            WriteOperation::Delete { path } => pb::Write {
                operation: Some(Operation::Delete(self.resource_name(&path))),
                ..Default::default()
            },
        }
    }
}

fn to_aggregation(field: &AggregateField) -> Aggregation {
    let reference = |path: &str| pb::structured_query::FieldReference {
        field_path: convert::quote_field_path(path),
    };
    let operator = match &field.aggregation_type {
        AggregationType::Count => AggOp::Count(Count { up_to: None }),
        AggregationType::Sum(path) => AggOp::Sum(Sum {
            field: Some(reference(path)),
        }),
        AggregationType::Average(path) => AggOp::Avg(Avg {
            field: Some(reference(path)),
        }),
    };
    Aggregation {
        alias: field.result_alias(),
        operator: Some(operator),
    }
}

#[async_trait]
impl Driver for GrpcDriver {
    async fn get_document(&self, path: &str) -> Result<Option<DocumentSnapshot>, FirestoreError> {
        let request = pb::GetDocumentRequest {
            name: self.resource_name(path),
            ..Default::default()
        };
        match self.client.clone().get_document(request).await {
            Ok(response) => Ok(Some(to_snapshot(&self.root, response.get_ref()))),
            Err(status) if status.code() == Code::NotFound => Ok(None),
            Err(status) => Err(status_error(status)),
        }
    }

    fn run_query(&self, query: StructuredQuery) -> DocumentStream {
        let mut client = self.client.clone();
        let root = self.root.clone();
        Box::pin(try_stream! {
            let (parent, structured) = to_structured_query(&root, &query)?;
            let request = pb::RunQueryRequest {
                parent,
                query_type: Some(pb::run_query_request::QueryType::StructuredQuery(structured)),
                ..Default::default()
            };
            let mut responses = client.run_query(request).await.map_err(status_error)?.into_inner();
            while let Some(response) = responses.message().await.map_err(status_error)? {
                if let Some(document) = response.document {
                    yield to_snapshot(&root, &document);
                }
            }
        })
    }

    async fn run_aggregation(
        &self,
        query: &StructuredQuery,
        aggregations: &[AggregateField],
    ) -> Result<Fields, FirestoreError> {
        use pb::run_aggregation_query_request::QueryType as RequestQuery;
        use pb::structured_aggregation_query::QueryType as AggregatedQuery;

        let (parent, structured) = to_structured_query(&self.root, query)?;
        let request = pb::RunAggregationQueryRequest {
            parent,
            query_type: Some(RequestQuery::StructuredAggregationQuery(
                pb::StructuredAggregationQuery {
                    query_type: Some(AggregatedQuery::StructuredQuery(structured)),
                    aggregations: aggregations.iter().map(to_aggregation).collect(),
                },
            )),
            ..Default::default()
        };

        let mut responses = self
            .client
            .clone()
            .run_aggregation_query(request)
            .await
            .map_err(status_error)?
            .into_inner();
        while let Some(response) = responses.message().await.map_err(status_error)? {
            if let Some(result) = response.result {
                return Ok(from_proto_fields(&result.aggregate_fields));
            }
        }
        Ok(Fields::new())
    }

    async fn commit(&self, writes: Vec<WriteOperation>) -> Result<(), FirestoreError> {
        let request = pb::CommitRequest {
            database: self.settings.database_path(),
            writes: writes.into_iter().map(|write| self.to_write(write)).collect(),
            transaction: Vec::new(),
        };
        self.client
            .clone()
            .commit(request)
            .await
            .map_err(status_error)?;
        Ok(())
    }
}

impl fmt::Debug for GrpcDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrpcDriver")
            .field("host", &self.settings.host)
            .field("root", &self.root)
            .finish()
    }
}
