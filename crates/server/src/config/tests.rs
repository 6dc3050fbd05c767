use std::path::Path;

use permittree_core::PermitType;

use super::*;

#[test]
fn empty_file_yields_defaults() {
    let config: PermitTreeConfig = toml::from_str("").unwrap();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.office, "PENRO");
    assert_eq!(config.state.backend, "memory");
    assert!(config.audit.enabled);
    assert_eq!(config.audit.prefix, "permittree_");
    assert!(!config.auth.enabled);
    assert!(config.background.enabled);
    assert_eq!(config.background.reminder_interval_seconds, 3600);
    assert_eq!(config.payments.due_days, 15);
    assert_eq!(config.certificates.validity_days, 365);
    assert!(config.fees.0.is_empty());
}

#[test]
fn full_config_parses() {
    let toml = r#"
        [server]
        host = "0.0.0.0"
        port = 9000
        office = "PENRO-LAGUNA"

        [state]
        backend = "postgres"
        url = "postgres://localhost/permittree"

        [audit]
        enabled = false

        [auth]
        enabled = true
        config_path = "auth.toml"
        jwt_expiry_seconds = 600

        [uploads]
        max_file_bytes = 1048576
        allowed_content_types = ["application/pdf"]

        [[fees.CSAW]]
        description = "Registration fee"
        legal_basis = "RA 9175"
        amount_centavos = 60000

        [certificates]
        template_dir = "templates"
        validity_days = 730

        [payments]
        due_days = 30

        [background]
        enabled = false
        reminder_interval_seconds = 60
    "#;
    let config: PermitTreeConfig = toml::from_str(toml).unwrap();
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.state.url.as_deref(), Some("postgres://localhost/permittree"));
    assert!(!config.audit.enabled);
    assert_eq!(config.auth.jwt_expiry_seconds, Some(600));
    assert!(config.auth.allow_registration.is_none());
    assert!(!config.background.enabled);

    let wf = config.workflow_config(Path::new("/etc/permittree")).unwrap();
    assert_eq!(wf.office, "PENRO-LAGUNA");
    assert_eq!(wf.max_file_bytes, 1_048_576);
    assert_eq!(wf.allowed_content_types, vec!["application/pdf".to_owned()]);
    assert_eq!(wf.payment_due_days, 30);
    assert_eq!(wf.certificate_validity_days, 730);
    assert_eq!(
        wf.template_dir.as_deref(),
        Some(Path::new("/etc/permittree/templates"))
    );
    let csaw = wf.fees_for(PermitType::Csaw);
    assert_eq!(csaw.len(), 1);
    assert_eq!(csaw[0].amount_centavos, 600_00);
    // Types without an override keep the built-in schedule.
    assert_eq!(wf.fees_for(PermitType::Cov), PermitType::Cov.default_fees());
}

#[test]
fn unknown_permit_code_in_fees_is_rejected() {
    let toml = r#"
        [[fees.XYZ]]
        description = "Mystery fee"
        amount_centavos = 100
    "#;
    let config: PermitTreeConfig = toml::from_str(toml).unwrap();
    let err = config.workflow_config(Path::new(".")).unwrap_err();
    assert!(err.to_string().contains("unknown permit code 'XYZ'"));
}

#[test]
fn non_positive_fees_and_days_are_rejected() {
    let config: PermitTreeConfig = toml::from_str(
        r#"
        [[fees.TCP]]
        description = "Permit fee"
        amount_centavos = 0
    "#,
    )
    .unwrap();
    assert!(config.workflow_config(Path::new(".")).is_err());

    let config: PermitTreeConfig = toml::from_str("[payments]\ndue_days = 0").unwrap();
    assert!(config.workflow_config(Path::new(".")).is_err());
}

#[test]
fn absolute_paths_are_kept() {
    assert_eq!(
        resolve_path(Path::new("/etc/permittree"), "/srv/auth.toml"),
        Path::new("/srv/auth.toml")
    );
    assert_eq!(
        resolve_path(Path::new("/etc/permittree"), "auth.toml"),
        Path::new("/etc/permittree/auth.toml")
    );
}
