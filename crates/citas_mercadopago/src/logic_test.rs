#[cfg(test)]
mod tests {
    use crate::logic::*;
    use crate::service::{Payment, PaymentPayer};
    use chrono::{NaiveDate, TimeZone, Utc};
    use citas_config::MercadoPagoConfig;
    use proptest::prelude::*;
    use rand::{rngs::StdRng, SeedableRng};
    use serde_json::json;

    fn mp_config() -> MercadoPagoConfig {
        serde_json::from_value(json!({
            "access_token": "TEST-token",
            "site_url": "https://dranikkita.com/"
        }))
        .unwrap()
    }

    fn payment_request() -> PaymentRequest {
        serde_json::from_value(json!({
            "nombre": "Ana María Pérez",
            "email": "ana@example.com",
            "telefono": "+56 9 1234 5678",
            "servicio": "Evaluación",
            "precio": 45000,
            "fecha": "2025-05-05",
            "hora": "10:00",
            "duracion": 60
        }))
        .unwrap()
    }

    #[test]
    fn test_free_when_price_zero_or_absent() {
        assert_eq!(chargeable_price(None).unwrap(), None);
        assert_eq!(chargeable_price(Some(&json!(0))).unwrap(), None);
        assert_eq!(chargeable_price(Some(&json!("0"))).unwrap(), None);
        assert_eq!(chargeable_price(Some(&json!(null))).unwrap(), None);
        assert_eq!(chargeable_price(Some(&json!(45000))).unwrap(), Some(45000.0));
        assert_eq!(chargeable_price(Some(&json!("45000"))).unwrap(), Some(45000.0));
        assert!(chargeable_price(Some(&json!(-10))).is_err());
        assert!(chargeable_price(Some(&json!("gratis"))).is_err());
    }

    #[test]
    fn test_preference_shape() {
        let preference = build_preference(&payment_request(), &mp_config(), "CITA-1-abc", 45000.0);
        let body = serde_json::to_value(&preference).unwrap();

        assert_eq!(body["items"][0]["title"], "Cita: Evaluación");
        assert_eq!(
            body["items"][0]["description"],
            "Cita con Dra. Nikkita - 2025-05-05 a las 10:00"
        );
        assert_eq!(body["items"][0]["currency_id"], "CLP");
        assert_eq!(body["items"][0]["quantity"], 1);
        assert_eq!(body["payer"]["name"], "Ana");
        assert_eq!(body["payer"]["surname"], "María Pérez");
        assert_eq!(body["payer"]["phone"]["number"], "56912345678");
        assert_eq!(
            body["back_urls"]["success"],
            "https://dranikkita.com/pago-exitoso.html?ref=CITA-1-abc"
        );
        assert_eq!(
            body["notification_url"],
            "https://dranikkita.com/api/payment-webhook"
        );
        assert_eq!(body["auto_return"], "approved");
        assert_eq!(body["metadata"]["duracion"], 60);
        assert_eq!(body["metadata"]["motivo"], "");
    }

    #[test]
    fn test_format_clp() {
        assert_eq!(format_clp(45000.0), "45.000");
        assert_eq!(format_clp(1234567.0), "1.234.567");
        assert_eq!(format_clp(999.0), "999");
        assert_eq!(format_clp(0.0), "0");
    }

    fn approved_payment(metadata: serde_json::Value) -> Payment {
        Payment {
            id: Some(json!(123456789)),
            status: Some("approved".into()),
            transaction_amount: Some(45000.0),
            metadata: metadata.as_object().cloned(),
            external_reference: Some("CITA-1-abc".into()),
            payer: Some(PaymentPayer {
                first_name: Some("Payer".into()),
                email: Some("payer@example.com".into()),
            }),
        }
    }

    #[test]
    fn test_paid_appointment_falls_back_to_payer() {
        let appointment = PaidAppointment::from_payment(&approved_payment(json!({})));

        assert_eq!(appointment.nombre, "Payer");
        assert_eq!(appointment.email, "payer@example.com");
        assert_eq!(appointment.servicio, "Consulta");
        assert_eq!(appointment.duracion, 30);
        assert_eq!(appointment.fecha, None);
    }

    #[test]
    fn test_window_uses_metadata_duration() {
        let appointment = PaidAppointment::from_payment(&approved_payment(json!({
            "nombre": "Ana", "fecha": "2025-05-05", "hora": "10:00", "duracion": "60"
        })));
        let (start, end) = appointment.window(Utc::now(), chrono_tz::America::Santiago);

        assert_eq!(start.to_string(), "2025-05-05 10:00:00");
        assert_eq!(end.to_string(), "2025-05-05 11:00:00");
    }

    #[test]
    fn test_out_of_range_duration_uses_default_length() {
        for duracion in [json!(1e15), json!("-5"), json!(0), json!(481), json!("NaN")] {
            let appointment = PaidAppointment::from_payment(&approved_payment(json!({
                "nombre": "Ana", "fecha": "2025-05-05", "hora": "10:00", "duracion": duracion
            })));
            assert_eq!(appointment.duracion, 30);

            let (start, end) = appointment.window(Utc::now(), chrono_tz::America::Santiago);
            assert_eq!(start.to_string(), "2025-05-05 10:00:00");
            assert_eq!((end - start).num_minutes(), 30);
        }

        let long = PaidAppointment::from_payment(&approved_payment(json!({"duracion": 480})));
        assert_eq!(long.duracion, 480);
    }

    #[test]
    fn test_window_falls_back_to_tomorrow_ten_in_clinic_zone() {
        let appointment = PaidAppointment::from_payment(&approved_payment(json!({"nombre": "Ana"})));
        // 02:00 UTC on the 6th is still the 5th in Santiago.
        let now = Utc.with_ymd_and_hms(2025, 5, 6, 2, 0, 0).unwrap();
        let (start, end) = appointment.window(now, chrono_tz::America::Santiago);

        assert_eq!(
            start,
            NaiveDate::from_ymd_opt(2025, 5, 6)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap()
        );
        assert_eq!((end - start).num_minutes(), 30);
    }

    #[test]
    fn test_paid_event_and_lead() {
        let appointment = PaidAppointment::from_payment(&approved_payment(json!({
            "nombre": "Ana Pérez", "servicio": "Evaluación", "fecha": "2025-05-05", "hora": "10:00"
        })));
        let receipt = PaymentReceipt {
            payment_id: "123456789",
            external_reference: Some("CITA-1-abc"),
            amount: Some(45000.0),
        };
        let window = appointment.window(Utc::now(), chrono_tz::America::Santiago);

        let event = build_paid_event(&appointment, &receipt, window);
        assert_eq!(event.subject, "✅ Cita PAGADA: Ana Pérez - Evaluación");
        assert!(event.description.contains("$45.000 CLP"));
        assert!(event.description.contains("CITA-1-abc"));

        let lead = build_paid_lead(&appointment, &receipt);
        assert_eq!(lead.status.as_deref(), Some("New"));
        assert_eq!(lead.first_name, "Ana");
        assert_eq!(
            lead.notes,
            "Cita pagada: Evaluación - 2025-05-05 10:00\nMonto: $45.000 CLP\nID Pago: 123456789"
        );
    }

    #[test]
    fn test_webhook_notification_parsing() {
        let query = WebhookQuery::default();

        let numeric = WebhookNotification::parse(br#"{"type":"payment","data":{"id":123}}"#, &query);
        assert!(numeric.is_payment());
        assert_eq!(numeric.payment_id.as_deref(), Some("123"));

        let other = WebhookNotification::parse(br#"{"type":"merchant_order"}"#, &query);
        assert!(!other.is_payment());

        let garbage = WebhookNotification::parse(b"not json", &query);
        assert_eq!(garbage, WebhookNotification { kind: None, payment_id: None });

        let from_query = WebhookNotification::parse(
            b"",
            &WebhookQuery {
                kind: Some("payment".into()),
                data_id: Some("777".into()),
                ..WebhookQuery::default()
            },
        );
        assert!(from_query.is_payment());
        assert_eq!(from_query.payment_id.as_deref(), Some("777"));

        let traversal = WebhookNotification::parse(
            br#"{"type":"payment","data":{"id":"../../users/me"}}"#,
            &query,
        );
        assert!(traversal.is_payment());
        assert_eq!(traversal.payment_id, None);
    }

    #[test]
    fn test_payment_id_charset() {
        assert!(is_valid_payment_id("123456789"));
        assert!(is_valid_payment_id("abc-DEF_9"));
        assert!(!is_valid_payment_id(""));
        assert!(!is_valid_payment_id("../../users/me"));
        assert!(!is_valid_payment_id("12?x=1"));
        assert!(!is_valid_payment_id("12 34"));
        assert!(!is_valid_payment_id(&"9".repeat(65)));
    }

    #[test]
    fn test_external_reference_is_seeded_random() {
        let now = Utc.with_ymd_and_hms(2025, 5, 5, 12, 0, 0).unwrap();
        let a = generate_external_reference(now, &mut StdRng::seed_from_u64(7));
        let b = generate_external_reference(now, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert!(a.starts_with(&format!("CITA-{}-", now.timestamp_millis())));
    }

    proptest! {
        #[test]
        fn test_external_reference_format(seed in any::<u64>(), millis in 0i64..4_102_444_800_000) {
            let now = Utc.timestamp_millis_opt(millis).unwrap();
            let reference = generate_external_reference(now, &mut StdRng::seed_from_u64(seed));

            let parts: Vec<&str> = reference.splitn(3, '-').collect();
            prop_assert_eq!(parts.len(), 3);
            prop_assert_eq!(parts[0], "CITA");
            prop_assert_eq!(parts[1], millis.to_string());
            prop_assert_eq!(parts[2].len(), 9);
            prop_assert!(parts[2].chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        }

        #[test]
        fn test_format_clp_keeps_digits(amount in 0u32..2_000_000_000) {
            let formatted = format_clp(amount as f64);
            prop_assert_eq!(formatted.replace('.', ""), amount.to_string());
            prop_assert!(formatted.split('.').skip(1).all(|group| group.len() == 3));
        }
    }
}
