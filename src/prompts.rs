//! Prompts for LLM normalization of auction notices.
//!
//! Callers can override the system prompt via
//! [`crate::config::PipelineConfig::system_prompt`]; the user prompt always
//! carries the field template below so answers parse into
//! [`crate::output::NormalizedNotice`].

/// Default system prompt for normalization.
pub const DEFAULT_SYSTEM_PROMPT: &str = "Você é um assistente especializado em extrair \
informações de editais de leilão. Sua tarefa é analisar o texto completo do edital e gerar \
um resumo estruturado em formato JSON seguindo o padrão estabelecido.";

/// Field template the model must fill, one object per lot/asset.
pub const NOTICE_TEMPLATE: &str = r#"{
  "leiloes": [
    {
      "numero_de_publicacao": ,
      "data_de_publicacao": ,
      "lote": ,
      "id_do_edital": ,
      "tipo_do_processo": ,
      "tribunal_ou_local": ,
      "tipo_do_bem": ,
      "executado": ,
      "numero_do_processo": ,
      "leiloeiro": ,
      "site_do_leiloeiro": ,
      "taxa_de_comissao": ,
      "data_do_1_leilao": ,
      "hora_do_1_leilao": ,
      "data_do_2_leilao": ,
      "hora_do_2_leilao": ,
      "data_demais_pracas": ,
      "percentual_do_1_leilao": ,
      "percentual_do_2_leilao": ,
      "percentual_das_demais_pracas": ,
      "descricao_dos_bens": ,
      "descricao_secundara_dos_bens": ,
      "valor_de_avaliacao": ,
      "data_de_avaliacao": ,
      "valor_atualizado": ,
      "data_atualizado": ,
      "divida_e_onus": ,
      "localizacao_dos_bens": ,
      "informacoes_adicionais":
    }
  ]
}"#;

/// Build the user prompt for one notice.
pub fn notice_prompt(notice_text: &str) -> String {
    format!(
        "Analise o seguinte edital de leilão judicial e extraia as informações relevantes.\n\n\
Se alguma informação não estiver disponível no edital, retorne null para o campo.\n\n\
Ao processar o edital, lembre-se da hierarquia de classificação dos bens:\n\
1. Um EDITAL pode conter MÚLTIPLOS LOTES (Lote 01, Lote 02, Lote 03, etc.)\n\
2. Cada LOTE pode conter UM ou MAIS BENS, indicados pela notação \"Y/Z\":\n\
   - \"Lote XX - 1/1\": O lote XX contém apenas um bem\n\
   - \"Lote XX - 1/3\", \"Lote XX - 2/3\", \"Lote XX - 3/3\": O lote XX contém três bens relacionados\n\
Mantenha esta estrutura exata no campo \"lote\" do JSON para cada bem identificado.\n\n\
IMPORTANTE: Retorne o JSON exatamente no formato abaixo, mantendo a estrutura e os nomes dos campos:\n\n\
{NOTICE_TEMPLATE}\n\n\
Edital:\n{notice_text}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_template_and_text() {
        let p = notice_prompt("EDITAL DE LEILÃO X");
        assert!(p.contains("\"leiloes\""));
        assert!(p.contains("descricao_secundara_dos_bens"));
        assert!(p.ends_with("Edital:\nEDITAL DE LEILÃO X\n"));
    }
}
