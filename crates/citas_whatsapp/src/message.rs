/// WhatsApp text carrying a verification code, in WhatsApp markdown.
pub fn verification_message(brand: &str, nombre: Option<&str>, code: &str, ttl_secs: i64) -> String {
    let greeting = match nombre.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("Hola {}! 👋", name),
        None => "Hola! 👋".to_string(),
    };
    format!(
        "🏥 *{brand} - Verificación*\n\n\
         {greeting}\n\n\
         Tu código de verificación es:\n\n\
         *{code}*\n\n\
         Este código expira en {minutes} minutos.\n\n\
         Si no solicitaste este código, ignora este mensaje.",
        minutes = ttl_secs / 60,
    )
}
