//! Field-whitelist validation for client, user and order payloads
//!
//! Predicates are pure. Validators read the JSON body without touching it,
//! collect every failing field, and report them together.

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;

static NOMBRE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z ]+$").expect("valid regex"));
static DOCUMENTO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9.]+$").expect("valid regex"));
static TELEFONO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{10}$").expect("valid regex"));
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));
static DIRECCION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9 #-]*$").expect("valid regex"));

/// Letters and spaces only, no accents
pub fn is_valid_nombre(nombre: &str) -> bool {
    !nombre.trim().is_empty() && NOMBRE_RE.is_match(nombre)
}

/// Digits and dots only
pub fn is_valid_documento(documento: &str) -> bool {
    DOCUMENTO_RE.is_match(documento)
}

/// Exactly ten digits
pub fn is_valid_telefono(telefono: &str) -> bool {
    TELEFONO_RE.is_match(telefono)
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Letters, digits, spaces, `#` and `-`; empty is allowed
pub fn is_valid_direccion(direccion: &str) -> bool {
    DIRECCION_RE.is_match(direccion)
}

/// Field → message map of every rule a payload broke
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Error)]
#[error("Datos inválidos en {} campo(s)", .0.len())]
#[serde(transparent)]
pub struct FieldErrors(pub BTreeMap<String, String>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Whether a validator runs for a create or for a partial update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Update,
}

/// Rule applied to a string field
type Rule = fn(&str) -> bool;

struct FieldSpec {
    name: &'static str,
    required: bool,
    rule: Option<(Rule, &'static str)>,
}

const fn field(name: &'static str, required: bool, rule: Option<(Rule, &'static str)>) -> FieldSpec {
    FieldSpec {
        name,
        required,
        rule,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Run the whitelist over a body. Unknown keys are errors, required fields
/// must be present on create, and every present field must match its rule.
fn check_fields(
    body: &Value,
    fields: &[FieldSpec],
    mode: Mode,
    errors: &mut FieldErrors,
) -> Option<()> {
    let Some(object) = body.as_object() else {
        errors.add("body", "Se esperaba un objeto JSON");
        return None;
    };

    for key in object.keys() {
        if !fields.iter().any(|f| f.name == key) {
            errors.add(key, "Campo no permitido");
        }
    }

    for def in fields {
        match object.get(def.name) {
            None => {
                if def.required && mode == Mode::Create {
                    errors.add(def.name, "Campo obligatorio");
                }
            }
            Some(value) if is_blank(value) => {
                if def.required {
                    errors.add(def.name, "Campo obligatorio");
                }
            }
            Some(value) => {
                if let Some((rule, message)) = def.rule {
                    match as_text(value) {
                        Some(text) if rule(&text) => {}
                        _ => errors.add(def.name, message),
                    }
                }
            }
        }
    }

    Some(())
}

const NOMBRE_MSG: &str = "Solo letras y espacios, sin tildes";
const DOCUMENTO_MSG: &str = "Solo números y puntos";
const TELEFONO_MSG: &str = "Debe tener exactamente 10 dígitos";
const EMAIL_MSG: &str = "Correo electrónico no válido";
const DIRECCION_MSG: &str = "Solo letras, números, espacios, # y -";

/// Client payload
pub fn validate_cliente(body: &Value, mode: Mode) -> Result<(), FieldErrors> {
    let fields = [
        field("id_cliente", false, None),
        field("nombre", true, Some((is_valid_nombre, NOMBRE_MSG))),
        field("documento", true, Some((is_valid_documento, DOCUMENTO_MSG))),
        field("telefono", true, Some((is_valid_telefono, TELEFONO_MSG))),
        field("email", false, Some((is_valid_email, EMAIL_MSG))),
        field("direccion", false, Some((is_valid_direccion, DIRECCION_MSG))),
    ];
    let mut errors = FieldErrors::default();
    check_fields(body, &fields, mode, &mut errors);
    errors.into_result()
}

/// Minimum password length for user accounts
pub const MIN_PASSWORD_LEN: usize = 6;

fn is_valid_usuario(usuario: &str) -> bool {
    !usuario.is_empty() && usuario.chars().all(|c| c.is_ascii_alphanumeric() || "._-".contains(c))
}

fn is_valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}

/// User payload
pub fn validate_usuario(body: &Value, mode: Mode) -> Result<(), FieldErrors> {
    let fields = [
        field("id_usuario", false, None),
        field("nombre", true, Some((is_valid_nombre, NOMBRE_MSG))),
        field(
            "usuario",
            true,
            Some((is_valid_usuario, "Solo letras, números, punto, guion y guion bajo")),
        ),
        field("email", true, Some((is_valid_email, EMAIL_MSG))),
        field("telefono", false, Some((is_valid_telefono, TELEFONO_MSG))),
        field(
            "password",
            true,
            Some((is_valid_password, "Debe tener al menos 6 caracteres")),
        ),
        field("id_rol", false, None),
        field("activo", false, None),
    ];
    let mut errors = FieldErrors::default();
    check_fields(body, &fields, mode, &mut errors);
    errors.into_result()
}

fn parse_date(value: Option<&Value>) -> Option<NaiveDate> {
    let text = value?.as_str()?.trim();
    let day = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Order payload. `total` and `abono` are deliberately not cross-checked.
pub fn validate_pedido(body: &Value, mode: Mode) -> Result<(), FieldErrors> {
    let fields = [
        field("id_pedido", false, None),
        field("id_cliente", true, None),
        field("fecha_inicio", true, None),
        field("fecha_entrega", true, None),
        field("estado", false, None),
        field("total", false, None),
        field("abono", false, None),
        field("observaciones", false, None),
        field("id_cajon", false, None),
        field("id_codigo", false, None),
        field("id_usuario", false, None),
        field("detalles", false, None),
    ];
    let mut errors = FieldErrors::default();
    if check_fields(body, &fields, mode, &mut errors).is_none() {
        return errors.into_result();
    }

    let inicio_raw = body.get("fecha_inicio").filter(|v| !is_blank(v));
    let entrega_raw = body.get("fecha_entrega").filter(|v| !is_blank(v));
    let inicio = parse_date(inicio_raw);
    let entrega = parse_date(entrega_raw);

    if inicio_raw.is_some() && inicio.is_none() {
        errors.add("fecha_inicio", "Fecha no válida (AAAA-MM-DD)");
    }
    if entrega_raw.is_some() && entrega.is_none() {
        errors.add("fecha_entrega", "Fecha no válida (AAAA-MM-DD)");
    }
    if let (Some(inicio), Some(entrega)) = (inicio, entrega) {
        if entrega < inicio {
            errors.add(
                "fecha_entrega",
                "La fecha de entrega no puede ser anterior a la de inicio",
            );
        }
    }

    errors.into_result()
}
