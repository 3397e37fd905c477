// crates/preflight-core/src/registry/tables.rs
// ============================================================================
// Module: Built-In Expected Policies
// Description: Provider baseline permission documents and permission sets.
// Purpose: Source tables for the built-in expected-policy registry.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Baselines the platform requires from each provider. Documents are
//! templates; placeholders are filled per environment before comparison.

// ============================================================================
// SECTION: AWS
// ============================================================================

/// Trust policy required on the provider role.
pub const AWS_ASSUME_ROLE_TRUST: &str = r#"{
  "Version": "2012-10-17",
  "Statement": [
    {
      "Effect": "Allow",
      "Principal": {
        "Federated": "arn:aws:iam::${ACCOUNT_ID}:oidc-provider/${OIDC_ID}"
      },
      "Action": "sts:AssumeRoleWithWebIdentity",
      "Condition": {
        "StringLike": {
          "${OIDC_ID}:sub": "system:serviceaccount:crossplane:aws-*"
        }
      }
    }
  ]
}"#;

/// Permission boundary attached to roles the provider creates.
pub const AWS_PERMISSION_BOUNDARY: &str = r#"{
  "Version": "2012-10-17",
  "Statement": [
    {
      "Sid": "AllowAllActionsApartFromListed",
      "Effect": "Allow",
      "NotAction": [
        "support:*",
        "organizations:*",
        "iam:Upload*",
        "iam:Update*",
        "iam:Untag*",
        "iam:Tag*",
        "iam:Set*",
        "iam:Resync*",
        "iam:Reset*",
        "iam:Remove*",
        "iam:Put*",
        "iam:PassRole",
        "iam:ListVirtualMFA*",
        "iam:ListMFA*",
        "iam:GetOrganizationsAccessReport",
        "iam:GetAccountAuthorizationDetails",
        "iam:Generate*",
        "iam:Enable*",
        "iam:Detach*",
        "iam:Delete*",
        "iam:Deactivate*",
        "iam:Create*",
        "iam:Change*",
        "iam:Attach*",
        "iam:Add*",
        "cloudtrail:DeleteTrail"
      ],
      "Resource": "*"
    }
  ]
}"#;

// ============================================================================
// SECTION: Azure
// ============================================================================

/// Actions required on the provider role definition.
pub const AZURE_ROLE_PERMISSIONS: &[&str] = &[
    "Microsoft.Authorization/policies/audit/action",
    "Microsoft.Authorization/policies/auditIfNotExists/action",
    "Microsoft.Authorization/roleAssignments/delete",
    "Microsoft.Authorization/roleAssignments/read",
    "Microsoft.Authorization/roleAssignments/write",
    "Microsoft.Authorization/roleDefinitions/delete",
    "Microsoft.Authorization/roleDefinitions/read",
    "Microsoft.Authorization/roleDefinitions/write",
    "Microsoft.ManagedIdentity/userAssignedIdentities/delete",
    "Microsoft.ManagedIdentity/userAssignedIdentities/federatedIdentityCredentials/delete",
    "Microsoft.ManagedIdentity/userAssignedIdentities/federatedIdentityCredentials/read",
    "Microsoft.ManagedIdentity/userAssignedIdentities/federatedIdentityCredentials/write",
    "Microsoft.ManagedIdentity/userAssignedIdentities/read",
    "Microsoft.ManagedIdentity/userAssignedIdentities/write",
    "Microsoft.Network/virtualNetworks/read",
    "Microsoft.Network/virtualNetworks/subnets/join/action",
    "Microsoft.Network/virtualNetworks/subnets/joinViaServiceEndpoint/action",
    "Microsoft.Network/virtualNetworks/subnets/read",
    "Microsoft.ServiceBus/namespaces/Delete",
    "Microsoft.ServiceBus/namespaces/queues/Delete",
    "Microsoft.ServiceBus/namespaces/queues/read",
    "Microsoft.ServiceBus/namespaces/queues/write",
    "Microsoft.ServiceBus/namespaces/read",
    "Microsoft.ServiceBus/namespaces/topics/Delete",
    "Microsoft.ServiceBus/namespaces/topics/read",
    "Microsoft.ServiceBus/namespaces/topics/subscriptions/Delete",
    "Microsoft.ServiceBus/namespaces/topics/subscriptions/read",
    "Microsoft.ServiceBus/namespaces/topics/subscriptions/rules/Delete",
    "Microsoft.ServiceBus/namespaces/topics/subscriptions/rules/read",
    "Microsoft.ServiceBus/namespaces/topics/subscriptions/rules/write",
    "Microsoft.ServiceBus/namespaces/topics/subscriptions/write",
    "Microsoft.ServiceBus/namespaces/topics/write",
    "Microsoft.ServiceBus/namespaces/write",
    "Microsoft.Storage/skus/read",
    "Microsoft.Storage/storageAccounts/blobServices/containers/delete",
    "Microsoft.Storage/storageAccounts/blobServices/containers/read",
    "Microsoft.Storage/storageAccounts/blobServices/containers/write",
    "Microsoft.Storage/storageAccounts/blobServices/generateUserDelegationKey/action",
    "Microsoft.Storage/storageAccounts/blobServices/read",
    "Microsoft.Storage/storageAccounts/blobServices/write",
    "Microsoft.Storage/storageAccounts/delete",
    "Microsoft.Storage/storageAccounts/fileServices/read",
    "Microsoft.Storage/storageAccounts/listkeys/action",
    "Microsoft.Storage/storageAccounts/managementPolicies/delete",
    "Microsoft.Storage/storageAccounts/managementPolicies/read",
    "Microsoft.Storage/storageAccounts/managementPolicies/write",
    "Microsoft.Storage/storageAccounts/read",
    "Microsoft.Storage/storageAccounts/regeneratekey/action",
    "Microsoft.Storage/storageAccounts/write",
];

// ============================================================================
// SECTION: GCP
// ============================================================================

/// Permissions required on the `uxp_provider*` custom role.
pub const GCP_ROLE_PERMISSIONS: &[&str] = &[
    "cloudsql.backupRuns.create",
    "cloudsql.backupRuns.delete",
    "cloudsql.backupRuns.get",
    "cloudsql.backupRuns.list",
    "cloudsql.instances.addServerCa",
    "cloudsql.instances.clone",
    "cloudsql.instances.connect",
    "cloudsql.instances.create",
    "cloudsql.instances.createTagBinding",
    "cloudsql.instances.delete",
    "cloudsql.instances.deleteTagBinding",
    "cloudsql.instances.export",
    "cloudsql.instances.failover",
    "cloudsql.instances.get",
    "cloudsql.instances.import",
    "cloudsql.instances.list",
    "cloudsql.instances.listEffectiveTags",
    "cloudsql.instances.listTagBindings",
    "cloudsql.instances.resetSslConfig",
    "cloudsql.instances.restart",
    "cloudsql.instances.restoreBackup",
    "cloudsql.instances.update",
    "cloudsql.users.create",
    "cloudsql.users.delete",
    "cloudsql.users.get",
    "cloudsql.users.list",
    "cloudsql.users.update",
    "iam.roles.create",
    "iam.roles.delete",
    "iam.roles.get",
    "iam.roles.list",
    "iam.roles.undelete",
    "iam.roles.update",
    "iam.serviceAccountKeys.create",
    "iam.serviceAccountKeys.delete",
    "iam.serviceAccountKeys.disable",
    "iam.serviceAccountKeys.enable",
    "iam.serviceAccountKeys.get",
    "iam.serviceAccountKeys.list",
    "iam.serviceAccounts.create",
    "iam.serviceAccounts.delete",
    "iam.serviceAccounts.disable",
    "iam.serviceAccounts.enable",
    "iam.serviceAccounts.get",
    "iam.serviceAccounts.getIamPolicy",
    "iam.serviceAccounts.list",
    "iam.serviceAccounts.setIamPolicy",
    "iam.serviceAccounts.undelete",
    "iam.serviceAccounts.update",
    "pubsub.subscriptions.create",
    "pubsub.subscriptions.delete",
    "pubsub.subscriptions.get",
    "pubsub.subscriptions.getIamPolicy",
    "pubsub.subscriptions.list",
    "pubsub.subscriptions.setIamPolicy",
    "pubsub.subscriptions.update",
    "pubsub.topics.attachSubscription",
    "pubsub.topics.create",
    "pubsub.topics.delete",
    "pubsub.topics.detachSubscription",
    "pubsub.topics.get",
    "pubsub.topics.getIamPolicy",
    "pubsub.topics.list",
    "pubsub.topics.setIamPolicy",
    "pubsub.topics.update",
    "pubsub.topics.updateTag",
    "resourcemanager.projects.get",
    "resourcemanager.projects.getIamPolicy",
    "resourcemanager.projects.setIamPolicy",
    "storage.buckets.create",
    "storage.buckets.createTagBinding",
    "storage.buckets.delete",
    "storage.buckets.deleteTagBinding",
    "storage.buckets.enableObjectRetention",
    "storage.buckets.get",
    "storage.buckets.getIamPolicy",
    "storage.buckets.list",
    "storage.buckets.listEffectiveTags",
    "storage.buckets.listTagBindings",
    "storage.buckets.setIamPolicy",
    "storage.buckets.update",
    "storage.hmacKeys.create",
    "storage.hmacKeys.delete",
    "storage.hmacKeys.get",
    "storage.hmacKeys.list",
    "storage.hmacKeys.update",
];
