//! Matching identities against aggregated trusted-list providers.

use trustgate_types::{Provider, ServiceEntry, TrustDecision, TrustSource};

/// First provider whose name equals `issuer` (case-insensitively), or whose
/// service subject name contains it. Providers and services are scanned in
/// list order.
pub(crate) fn match_issuer(providers: &[Provider], issuer: &str) -> Option<TrustDecision> {
    let wanted = issuer.to_lowercase();
    for provider in providers {
        if provider.name.to_lowercase() == wanted {
            return Some(decision(provider, provider.services.first(), "provider_name"));
        }
        if let Some(service) = provider
            .services
            .iter()
            .find(|s| subject_contains(s, issuer))
        {
            return Some(decision(provider, Some(service), "subject_name"));
        }
    }
    None
}

/// First service whose subject name contains `client_id`, or whose
/// certificate is one of `certificates` (DER).
pub(crate) fn match_verifier(
    providers: &[Provider],
    client_id: &str,
    certificates: Option<&[Vec<u8>]>,
) -> Option<TrustDecision> {
    let certificates = certificates.unwrap_or(&[]);
    for provider in providers {
        for service in &provider.services {
            if !client_id.is_empty() && subject_contains(service, client_id) {
                return Some(decision(provider, Some(service), "subject_name"));
            }
            let presented = service.digital_identity.as_ref().map_or(false, |identity| {
                certificates.iter().any(|der| identity.matches_certificate(der))
            });
            if presented {
                return Some(decision(provider, Some(service), "certificate"));
            }
        }
    }
    None
}

fn subject_contains(service: &ServiceEntry, needle: &str) -> bool {
    service
        .subject_name()
        .map_or(false, |subject| subject.contains(needle))
}

fn decision(provider: &Provider, service: Option<&ServiceEntry>, matched_on: &str) -> TrustDecision {
    let mut decision = TrustDecision::trusted_by(TrustSource::EtsiTrustList)
        .with_provider_name(provider.name.clone())
        .with_territory(provider.territory.clone())
        .with_evidence("matched_on", matched_on);

    if let Some(service) = service {
        decision = decision
            .with_status(service.status_label())
            .with_validity(service.status_starting_time, None)
            .with_evidence("service_type", service.service_type.clone())
            .with_evidence("service_name", service.service_name.clone())
            .with_evidence("service_status", service.status.clone())
            .with_evidence("granted", service.is_granted().to_string())
            .with_evidence("qualified", service.is_qualified().to_string());
    }
    decision
}
