// Prompt templates for report synthesis, disease extraction and clinical summaries

use std::collections::BTreeMap;

use thiserror::Error;

use crate::types::LLMMessage;

/// Sentence appended verbatim to every clinical-protocol summary.
pub const CLINICAL_DISCLAIMER: &str = "Esta informação é um resumo de fontes públicas para fins informativos e não substitui a avaliação e o aconselhamento de um profissional de saúde qualificado.";

#[derive(Debug, Error, PartialEq)]
pub enum PromptError {
    #[error("template '{template}' references undefined variable '{name}'")]
    MissingVariable { template: &'static str, name: String },
}

/// Named values substituted into `{name}` placeholders.
#[derive(Debug, Clone, Default)]
pub struct PromptVars(BTreeMap<String, String>);

impl PromptVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// A system instruction plus a user message, both with `{name}` placeholders.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub name: &'static str,
    pub system: Option<&'static str>,
    pub user: &'static str,
}

impl PromptTemplate {
    pub const fn new(name: &'static str, system: Option<&'static str>, user: &'static str) -> Self {
        Self { name, system, user }
    }

    /// Render into chat messages. Every placeholder must have a value.
    pub fn render(&self, vars: &PromptVars) -> Result<Vec<LLMMessage>, PromptError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.system {
            messages.push(LLMMessage::system(self.substitute(system, vars)?));
        }
        messages.push(LLMMessage::user(self.substitute(self.user, vars)?));
        Ok(messages)
    }

    fn substitute(&self, text: &str, vars: &PromptVars) -> Result<String, PromptError> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) if is_placeholder(&after[..close]) => {
                    let name = &after[..close];
                    let value = vars.get(name).ok_or_else(|| PromptError::MissingVariable {
                        template: self.name,
                        name: name.to_string(),
                    })?;
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                _ => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}

fn is_placeholder(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub const FINAL_REPORT: PromptTemplate = PromptTemplate::new(
    "final_report",
    Some("Você é um analista de dados de saúde especialista em doenças respiratórias. Sua tarefa é gerar um relatório aprofundado e informativo sobre o cenário da Síndrome Respiratória Aguda Grave (SRAG), utilizando todas as métricas disponíveis."),
    r#"Por favor, gere um relatório completo e aprofundado sobre a SRAG com base em todos os dados coletados. No seu texto, mencione que os gráficos com a evolução diária e mensal dos casos foram gerados como parte desta análise.

**Tópico da Análise:** {topic}

**Métricas Principais (últimos dados disponíveis):**
- Taxa de Mortalidade (Letalidade): {mortality_rate}%
- Percentual de Internados em UTI: {icu_rate}%
- Percentual de Pacientes Vacinados (COVID-19): {vaccination_rate}%
- Percentual de Pacientes Vacinados (Gripe): {flu_vaccination_rate}%
- Variação Semanal de Casos: {case_increase_rate}
- Tempo Médio para Notificação: {avg_notification_days}
- Proporção de Casos por Causa: {case_proportions}
- Letalidade por Faixa Etária (%): {lethality_by_age}
- % de Pacientes em UTI com Ventilação Invasiva: {invasive_ventilation_rate}%

**Contexto das Notícias Recentes:**
{news_context}

**Resumo de Protocolos Clínicos Relevantes:**
{protocols_context}

**ESTRUTURA DO RELATÓRIO**
1. **Resumo Executivo:** Um parágrafo inicial com sua interpretação do cenário geral, combinando as métricas principais, as notícias e os insights mais importantes das métricas detalhadas (ex: qual vírus predomina ou qual faixa etária está em maior risco).
2. **Análise Epidemiológica:**
   - **Métricas Gerais:** Explique o significado das métricas principais.
   - **Perfil dos Casos:** Analise a 'Proporção de Casos por Causa'. Qual vírus (COVID-19, Influenza, etc.) está impulsionando os casos de SRAG na região?
3. **Análise de Risco e Gravidade:**
   - **Grupos Vulneráveis:** Analise a 'Letalidade por Faixa Etária', destacando os grupos de maior risco.
   - **Gravidade dos Casos Críticos:** Comente sobre a '% de Pacientes em UTI com Ventilação Invasiva' como um indicador da severidade dos casos que necessitam de cuidados intensivos.
4. **Análise Operacional do Sistema de Saúde:**
   - Comente sobre o 'Tempo Médio para Notificação'. Um tempo alto pode indicar demoras no diagnóstico ou na busca por atendimento? Um tempo baixo é um bom sinal?
5. **Contexto Atual e Protocolos:**
   - Use as notícias para dar contexto aos números e tendências observadas.
   - Apresente os resumos de tratamentos encontrados pelo sub-agente.
6. **Conclusão e Recomendações:** Um parágrafo final com as principais conclusões da análise completa e possíveis recomendações.

O relatório deve ser claro, objetivo e escrito em português do Brasil."#,
);

pub const DISEASE_EXTRACTION: PromptTemplate = PromptTemplate::new(
    "disease_extraction",
    None,
    "Leia o seguinte conjunto de notícias e liste as principais doenças respiratórias mencionadas (como 'Influenza A', 'Vírus Sincicial Respiratório', 'Covid-19'). Responda apenas com os nomes das doenças, separados por vírgula. Notícias: {news}",
);

pub const CLINICAL_SUMMARY: PromptTemplate = PromptTemplate::new(
    "clinical_summary",
    Some("Você é um assistente de IA especializado em extrair e resumir informações sobre protocolos clínicos e tratamentos de fontes médicas confiáveis para auxiliar profissionais de saúde. Você não fornece aconselhamento médico direto."),
    r#"Com base nos trechos de artigos recuperados abaixo, resuma as principais abordagens de tratamento, medicamentos comuns e protocolos de manejo clínico para a doença: **{disease}**.

Concentre-se em informações objetivas e relevantes para um profissional da área.

**Artigos Recuperados:**
{context}

**Resumo:**
[Seu resumo conciso aqui]

**Aviso Importante:**
Sempre finalize sua resposta com o seguinte aviso, sem nenhuma modificação:
'Esta informação é um resumo de fontes públicas para fins informativos e não substitui a avaliação e o aconselhamento de um profissional de saúde qualificado.'"#,
);
