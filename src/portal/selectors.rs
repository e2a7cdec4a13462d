//! CSS selectors and fixed text markers of the operator portal.
//!
//! These describe page structure, not behavior: any portal exposing the same
//! structure works with the same workflow. URLs live in `PortalConfig`.

// Login page.
pub const LOGIN_USER_INPUT: &str = "#codigoUsuario";
pub const LOGIN_PASSWORD_INPUT: &str = "#senha";
pub const LOGIN_SUBMIT: &str = r#"input[type="submit"][value="Autenticar"]"#;

/// Banner shown on the portal's known transient failure page. Playwright's
/// `:has-text()` has no CSS equivalent, so the text is matched in code
/// against the visible paragraphs.
pub const TRANSIENT_ERROR_CONTAINER: &str = "p";
pub const TRANSIENT_ERROR_TEXT: &str = "Erro Inesperado. Favor tente novamente.";

// Vehicle list views.
pub const VEHICLE_TABLE: &str = "table#tabela-veiculo";
pub const VEHICLE_ROWS: &str = "table#tabela-veiculo tbody tr";
pub const VEHICLE_PLATE_CELL: &str = "td:nth-child(2)";
pub const VEHICLE_EDIT_LINK: &str = "a.btn.btn--square.alterar-veiculo-js";

// Vehicle detail page, certificates tab.
pub const CERTIFICATES_TAB: &str = "a#certificados-tab";
pub const CERTIFICATE_BLOCK: &str = "fieldset.certificado-box";
pub const CERTIFICATE_TITLE: &str = ".licenca-titulo .titulo.h3";
pub const EXPIRED_BADGE: &str = ".badge--vermelho";
pub const EXPIRED_BADGE_TEXT: &str = "Vencido";

// Per-block update form. The numeric suffix of the input ids is assigned by
// the portal at render time and must be read live (see `certificates.rs`).
pub const UPDATE_BUTTON: &str = "button.btn-atualizar-requisito";
pub const NUMBER_INPUT: &str = "input[name^='licenca-numero-']";
pub const FILE_INPUT: &str = r#"input[type="file"]"#;
pub const BLOCK_BUTTONS: &str = "button";
pub const SUBMIT_BUTTON_TEXT: &str = "Enviar novo certificado";
pub const SUCCESS_AREA: &str = "div.mensagem--sucesso";

// Page-level save.
pub const SAVE_BUTTON: &str = "a#botaoAtualizar";
