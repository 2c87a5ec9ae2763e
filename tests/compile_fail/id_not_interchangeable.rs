// ABOUTME: Compile-fail test verifying ProjectId and DeploymentId are not interchangeable.
// ABOUTME: This test should fail to compile, validating type safety.

use zeroshift::types::{DeploymentId, ProjectId};

fn takes_project_id(_id: ProjectId) {}

fn main() {
    let deployment_id = DeploymentId::new("0b7c9a52");
    takes_project_id(deployment_id); // ERROR: expected ProjectId, found DeploymentId
}
