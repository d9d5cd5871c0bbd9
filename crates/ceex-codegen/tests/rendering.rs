use ceex_codegen::{compile, Assigns, CompileOptions, RenderError, Safe, Value};
use pretty_assertions::assert_eq;
use serde_json::json;

fn assigns(value: serde_json::Value) -> Assigns {
    serde_json::from_value(value).unwrap()
}

fn render(source: &str, value: serde_json::Value) -> String {
    try_render(source, value).unwrap()
}

fn try_render(source: &str, value: serde_json::Value) -> Result<String, RenderError> {
    compile(source, &CompileOptions::default())
        .unwrap()
        .render_to_string(assigns(value))
}

// =========================================================================
// Static markup
// =========================================================================

#[test]
fn static_markup_round_trips() {
    let sources = [
        "<p>hello</p>",
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"></head>\n</html>\n",
        "<div class='single' data-x=\"a > b\">\n  <!-- keep <me> -->\n  text &amp; more\n</div>",
        "<script>var x = {a: 1}; if (a < b) {}</script>",
        "<style>p { color: red; }</style>",
        "\n\n<p>leading and trailing blank lines</p>\n\n",
    ];
    for source in sources {
        assert_eq!(render(source, json!({})), source);
    }
}

#[test]
fn void_elements_render_without_close_tag() {
    assert_eq!(render("<br>", json!({})), "<br>");
    assert_eq!(render("<br/>", json!({})), "<br>");
    assert_eq!(render("<img src=\"a.png\" />", json!({})), "<img src=\"a.png\">");

    let options = CompileOptions::default();
    let a = compile("<hr>", &options).unwrap();
    let b = compile("<hr />", &options).unwrap();
    assert_eq!(a.program(), b.program());
}

#[test]
fn no_curly_interpolation_attribute() {
    let source = "<pre ceex-no-curly-interpolation>{not code} <%= @x %></pre>";
    assert_eq!(
        render(source, json!({"x": 1})),
        "<pre ceex-no-curly-interpolation>{not code} 1</pre>"
    );
}

#[test]
fn host_expression_comments_and_escapes() {
    assert_eq!(render("a<%# hidden %>b", json!({})), "ab");
    assert_eq!(render("<%% literal", json!({})), "<% literal");
}

// =========================================================================
// Dynamic content
// =========================================================================

#[test]
fn interpolation_is_escaped_once() {
    assert_eq!(
        render("<p>{@text}</p>", json!({"text": "<b>\"Tom\" & 'Jerry'</b>"})),
        "<p>&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;</p>"
    );
}

#[test]
fn safe_values_are_not_escaped_again() {
    let template = compile("<p>{@html}{raw(@text)}</p>", &CompileOptions::default()).unwrap();
    let mut assigns = Assigns::new();
    assigns.insert("html".into(), Value::Safe(Safe::raw("<em>&amp;</em>")));
    assigns.insert("text".into(), Value::str("<i>"));
    assert_eq!(
        template.render_to_string(assigns).unwrap(),
        "<p><em>&amp;</em><i></p>"
    );
}

#[test]
fn output_and_exec_tags() {
    assert_eq!(render("<%= @n + 1 %>", json!({"n": 1})), "2");
    assert_eq!(render("a<% @n %>b", json!({"n": 1})), "ab");
}

#[test]
fn expressions() {
    let data = json!({
        "user": {"name": "ada", "tags": ["x", "y"]},
        "count": 3
    });
    assert_eq!(
        render("{String.upcase(@user.name)} has {length(@user.tags)} tags", data.clone()),
        "ADA has 2 tags"
    );
    assert_eq!(render("{Enum.join(@user.tags, \", \")}", data.clone()), "x, y");
    assert_eq!(render("{\"#{@count} items\"}", data.clone()), "3 items");
    assert_eq!(render("{@count > 2 && \"many\"}", data.clone()), "many");
    assert_eq!(render("{@user[\"missing\"] || \"none\"}", data), "none");
}

// =========================================================================
// Attributes
// =========================================================================

#[test]
fn dynamic_attributes() {
    let source = "<input type=\"text\" value={@value} disabled={@disabled} required={@required} title={@title}>";
    assert_eq!(
        render(
            source,
            json!({"value": "a\"b", "disabled": false, "required": true, "title": null})
        ),
        "<input type=\"text\" value=\"a&quot;b\" required>"
    );
}

#[test]
fn root_attributes_keep_declaration_order() {
    let source = "<a href=\"/\" {@rest} class={@class}>x</a>";
    assert_eq!(
        render(source, json!({"rest": {"id": "home", "data-x": 1}, "class": "nav"})),
        "<a href=\"/\" data-x=\"1\" id=\"home\" class=\"nav\">x</a>"
    );
}

#[test]
fn class_lists_drop_falsy_members() {
    assert_eq!(
        render("<b class={[\"btn\", @active && \"on\", nil]}>x</b>", json!({"active": false})),
        "<b class=\"btn\">x</b>"
    );
}

// =========================================================================
// Special attributes
// =========================================================================

#[test]
fn if_attribute() {
    let source = "<div :if={@flag} id=\"test\">yes</div>";
    assert_eq!(render(source, json!({"flag": true})), "<div id=\"test\">yes</div>");
    assert_eq!(render(source, json!({"flag": false})), "");
}

#[test]
fn for_with_if_filters_iterations() {
    let source = "<ul><li :for={i <- 1..4} :if={rem(i, 2) == 0}>{i}</li></ul>";
    assert_eq!(render(source, json!({})), "<ul><li>2</li><li>4</li></ul>");
}

#[test]
fn for_destructures_items() {
    let source = "<p :for={%{name: name, age: age} <- @people}>{name}: {age}</p>";
    assert_eq!(
        render(
            source,
            json!({"people": [{"name": "Ada", "age": 36}, {"name": "Alan", "age": 41}]})
        ),
        "<p>Ada: 36</p><p>Alan: 41</p>"
    );
}

#[test]
fn for_over_map_yields_pairs() {
    let source = "<dl><dt :for={{k, v} <- @meta}>{k}={v}</dt></dl>";
    assert_eq!(
        render(source, json!({"meta": {"a": 1, "b": 2}})),
        "<dl><dt>a=1</dt><dt>b=2</dt></dl>"
    );
}

// =========================================================================
// Do-blocks
// =========================================================================

#[test]
fn if_else_block() {
    let source = "<%= if @admin do %>admin<% else %>user<% end %>";
    assert_eq!(render(source, json!({"admin": true})), "admin");
    assert_eq!(render(source, json!({"admin": false})), "user");
}

#[test]
fn unless_block() {
    let source = "<%= unless @hidden do %>shown<% end %>";
    assert_eq!(render(source, json!({"hidden": false})), "shown");
    assert_eq!(render(source, json!({"hidden": true})), "");
}

#[test]
fn for_block() {
    let source = "<ul><%= for item <- @items do %><li>{item}</li><% end %></ul>";
    assert_eq!(
        render(source, json!({"items": ["a", "b"]})),
        "<ul><li>a</li><li>b</li></ul>"
    );
}

// =========================================================================
// Whitespace
// =========================================================================

#[test]
fn boundary_whitespace_next_to_interpolation_is_suppressed() {
    assert_eq!(render("\n  {\"c1\"}\n\n  c2\n", json!({})), "c1\n\n  c2\n");
}

#[test]
fn trailing_whitespace_after_do_block_is_suppressed() {
    let source = "<%= if true do %>\n  yes\n<% end %>\n";
    assert_eq!(render(source, json!({})), "\n  yes\n");
}

#[test]
fn whitespace_next_to_static_markup_is_kept() {
    let source = "\n<div>\n  static\n</div>\n\n{@a}";
    assert_eq!(render(source, json!({"a": "x"})), "\n<div>\n  static\n</div>\n\nx");
}

#[test]
fn whitespace_around_dynamic_element_is_suppressed() {
    assert_eq!(
        render("\n  <p id={@x}>a</p>\n", json!({"x": 1})),
        "<p id=\"1\">a</p>"
    );
    assert_eq!(
        render("\n<div>\n  {@a}\n</div>\n", json!({"a": "x"})),
        "<div>\n  x\n</div>"
    );
}

// =========================================================================
// Runtime errors
// =========================================================================

#[test]
fn missing_assign() {
    let err = try_render("<p>{@name}</p>", json!({"id": 1, "age": 2})).unwrap_err();
    assert_eq!(
        err,
        RenderError::MissingAssign {
            name: "name".into(),
            available: "[:age, :id]".into(),
        }
    );
}

#[test]
fn maps_are_not_renderable() {
    let err = try_render("{@m}", json!({"m": {"a": 1}})).unwrap_err();
    assert_eq!(err.to_string(), "cannot render %{a: 1} as HTML");
}

#[test]
fn generator_over_non_enumerable() {
    let err = try_render("<p :for={x <- @n}>{x}</p>", json!({"n": 5})).unwrap_err();
    assert_eq!(err, RenderError::NotEnumerable { value: "5".into() });
}
