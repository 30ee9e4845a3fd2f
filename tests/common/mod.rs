//! Common test utilities for integration tests
//!
//! Provides shared fixtures and builders used across multiple integration
//! test files: taxonomies, service catalogs and task templates assembled
//! from compact literal descriptions.

// Not every suite uses every fixture.
#![allow(dead_code)]

use weaver::domain::models::service::{OutputsSpec, ServiceSpec};
use weaver::{GoalSpec, Qos, SearchSpace, ServiceCatalog, TaskTemplate, Taxonomy, TemplateSpec};

/// Build a taxonomy from concept names and parent->child links.
pub fn taxonomy(names: &[&str], links: &[(&str, &str)]) -> Taxonomy {
    let mut tax = Taxonomy::new();
    for name in names {
        tax.insert(name);
    }
    for (parent, child) in links {
        let parent = tax.resolve(parent).unwrap();
        let child = tax.resolve(child).unwrap();
        tax.link(parent, child);
    }
    tax
}

/// A single-outcome service with neutral QoS.
pub fn service(name: &str, inputs: &[&str], outputs: &[&str]) -> ServiceSpec {
    service_with_qos(name, inputs, outputs, Qos::default())
}

/// A single-outcome service with explicit QoS attributes.
pub fn service_with_qos(name: &str, inputs: &[&str], outputs: &[&str], qos: Qos) -> ServiceSpec {
    ServiceSpec {
        name: name.to_string(),
        qos: Some(qos),
        inputs: inputs.iter().map(ToString::to_string).collect(),
        output_possibilities: vec![OutputsSpec {
            probability: 1.0,
            outputs: outputs.iter().map(ToString::to_string).collect(),
        }],
    }
}

/// A two-outcome branching service; the first alternative is the general one.
pub fn branching_service(
    name: &str,
    inputs: &[&str],
    general: (f64, &[&str]),
    specific: (f64, &[&str]),
    qos: Qos,
) -> ServiceSpec {
    ServiceSpec {
        name: name.to_string(),
        qos: Some(qos),
        inputs: inputs.iter().map(ToString::to_string).collect(),
        output_possibilities: vec![
            OutputsSpec {
                probability: general.0,
                outputs: general.1.iter().map(ToString::to_string).collect(),
            },
            OutputsSpec {
                probability: specific.0,
                outputs: specific.1.iter().map(ToString::to_string).collect(),
            },
        ],
    }
}

/// A template with one output goal.
pub fn linear_template(inputs: &[&str], outputs: &[&str]) -> TemplateSpec {
    TemplateSpec {
        provided_inputs: inputs.iter().map(ToString::to_string).collect(),
        goal: GoalSpec::Outputs(outputs.iter().map(ToString::to_string).collect()),
    }
}

/// Timed QoS with neutral remaining attributes.
pub fn timed(time: f64) -> Qos {
    Qos {
        time,
        ..Qos::default()
    }
}

/// Assemble a prepared search space from raw parts.
pub fn prepare(tax: Taxonomy, services: &[ServiceSpec], template: &TemplateSpec) -> SearchSpace {
    let catalog = ServiceCatalog::resolve(services, &tax).unwrap();
    let compiled = TaskTemplate::compile(template, &tax).unwrap();
    SearchSpace::prepare(tax, catalog, compiled).unwrap()
}
