//! Default named templates, registered at `TemplateRenderer::new`. Operators
//! can override any of these via `register_template` (spec §4.F: "named
//! template registry").

use handlebars::Handlebars;

const NEW_ITEM: &str = include_str!("defaults/new_item.hbs");
const UPGRADED_ITEM: &str = include_str!("defaults/upgraded_item.hbs");

pub fn register_defaults(handlebars: &mut Handlebars<'static>) {
    handlebars
        .register_template_string("new_item", NEW_ITEM)
        .expect("default new_item template is valid");
    handlebars
        .register_template_string("upgraded_item", UPGRADED_ITEM)
        .expect("default upgraded_item template is valid");
}
