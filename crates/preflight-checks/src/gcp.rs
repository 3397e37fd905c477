// crates/preflight-checks/src/gcp.rs
// ============================================================================
// Module: GCP Stages
// Description: In-cluster role permission check through gcloud.
// Purpose: Verify the provider role without federating a token.
// Dependencies: async-trait, preflight-cluster, preflight-core, preflight-identity
// ============================================================================

//! ## Overview
//! GCP permissions are read from inside the cluster: a Pod running as the
//! provider ServiceAccount resolves its single `uxp_provider*` custom role
//! and prints the role's permissions as one `;`-separated line.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use preflight_cluster::EphemeralExecutor;
use preflight_cluster::PodTemplate;
use preflight_core::CheckContext;
use preflight_core::CheckError;
use preflight_core::CloudProvider;
use preflight_core::ExpectedPolicyRegistry;
use preflight_core::Stage;
use preflight_core::StageId;
use preflight_core::StageInputs;
use preflight_core::StageOutputs;
use preflight_identity::tokens::GCP_SERVICE_ACCOUNT;

use crate::compare::expected_permissions;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Reserved name of the role checker Pod.
pub const ROLE_CHECKER_POD: &str = "gcp-crossplane-role-checker";
/// Image providing `gcloud`.
pub const ROLE_CHECKER_IMAGE: &str = "google/cloud-sdk:latest";
/// Role id prefix of the provider's custom role.
pub const PROVIDER_ROLE_PREFIX: &str = "uxp_provider";

/// Resolves the provider role and prints its permissions on one line.
///
/// Exits non-zero with a message on stderr when zero or several provider
/// roles are bound to the active account.
pub const ROLE_CHECKER_SCRIPT: &str = r#"set -o pipefail
account=$(gcloud auth list --filter=status:ACTIVE --format="value(account)")
project=$(gcloud config get-value project)
bound=$(gcloud projects get-iam-policy "$project" \
  --flatten="bindings[].members" \
  --filter="bindings.members:$account" \
  --format="value(bindings.role)")

selected=""
for role in $bound; do
  id="${role##*/}"
  case "$id" in
    uxp_provider*)
      if [[ -n "$selected" ]]; then
        echo "More than one uxp_provider role found" >&2
        exit 1
      fi
      selected="$id"
      ;;
  esac
done

if [[ -z "$selected" ]]; then
  echo "No uxp_provider role found" >&2
  exit 1
fi

gcloud iam roles describe "$selected" --project="$project" \
  --format="value(includedPermissions)" || exit 1
"#;

// ============================================================================
// SECTION: Pod
// ============================================================================

/// Builds the role checker Pod in the provider namespace.
#[must_use]
pub fn role_checker_pod(namespace: &str) -> PodTemplate {
    PodTemplate {
        namespace: namespace.to_string(),
        name: ROLE_CHECKER_POD.to_string(),
        service_account: GCP_SERVICE_ACCOUNT.to_string(),
        image: ROLE_CHECKER_IMAGE.to_string(),
        command: vec!["/bin/bash".to_string(), "-c".to_string(), ROLE_CHECKER_SCRIPT.to_string()],
        env: BTreeMap::new(),
    }
}

// ============================================================================
// SECTION: Stage
// ============================================================================

/// Runs the role checker and compares its output with the expected listing.
pub struct GcpRolePermissionsStage {
    /// Pod executor.
    executor: EphemeralExecutor,
    /// Role checker Pod.
    pod: PodTemplate,
    /// Expected listings.
    registry: Arc<ExpectedPolicyRegistry>,
}

impl GcpRolePermissionsStage {
    /// Builds the stage.
    #[must_use]
    pub const fn new(executor: EphemeralExecutor, pod: PodTemplate, registry: Arc<ExpectedPolicyRegistry>) -> Self {
        Self {
            executor,
            pod,
            registry,
        }
    }
}

#[async_trait]
impl Stage for GcpRolePermissionsStage {
    fn id(&self) -> StageId {
        StageId::RolePermissions
    }

    async fn handle(&self, ctx: &CheckContext, _inputs: StageInputs) -> Result<StageOutputs, CheckError> {
        let expected = expected_permissions(&self.registry, CloudProvider::Gcp)?;
        self.executor.check_permissions(ctx, &self.pod, expected).await?;
        Ok(StageOutputs::none())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
